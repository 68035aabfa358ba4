//! Probing tasks and their dataset providers
//!
//! Each task supplies a fixed in-memory list of labeled examples. An example
//! pairs a sentence with a target word occurring in it and an integer class
//! label; the probe measures how decodable that label is from the model's
//! activation at the target word's token position.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One labeled probing example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    pub target_word: String,
    pub label: usize,
}

/// Linguistic property probed by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Part of speech of the target word (noun/verb/adjective/adverb).
    Pos,
    /// Whether the target word is a named entity (common vs proper noun).
    Ner,
    /// Letter-count bucket of the target word (short/medium/long).
    WordLength,
    /// Sentence sentiment (positive/negative/neutral).
    Sentiment,
    /// Tense of the target verb (present/past).
    VerbTense,
    /// Grammatical number of the target noun (singular/plural).
    Plurality,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Pos,
        Task::Ner,
        Task::WordLength,
        Task::Sentiment,
        Task::VerbTense,
        Task::Plurality,
    ];

    /// Short identifier used in the results table and file names.
    pub fn name(self) -> &'static str {
        match self {
            Task::Pos => "pos",
            Task::Ner => "ner",
            Task::WordLength => "word_length",
            Task::Sentiment => "sentiment",
            Task::VerbTense => "verb_tense",
            Task::Plurality => "plurality",
        }
    }

    /// Human-readable title used in plot captions and logs.
    pub fn title(self) -> &'static str {
        match self {
            Task::Pos => "Part of Speech",
            Task::Ner => "Named Entity Recognition",
            Task::WordLength => "Word Length",
            Task::Sentiment => "Sentiment",
            Task::VerbTense => "Verb Tense",
            Task::Plurality => "Plurality",
        }
    }

    pub fn n_classes(self) -> usize {
        self.class_names().len()
    }

    pub fn class_names(self) -> &'static [&'static str] {
        match self {
            Task::Pos => &["noun", "verb", "adjective", "adverb"],
            Task::Ner => &["common_noun", "named_entity"],
            Task::WordLength => &["short", "medium", "long"],
            Task::Sentiment => &["positive", "negative", "neutral"],
            Task::VerbTense => &["present", "past"],
            Task::Plurality => &["singular", "plural"],
        }
    }

    /// The task's curated dataset.
    pub fn dataset(self) -> Vec<Example> {
        match self {
            Task::Pos => pos_dataset(),
            Task::Ner => ner_dataset(),
            Task::WordLength => word_length_dataset(),
            Task::Sentiment => sentiment_dataset(),
            Task::VerbTense => verb_tense_dataset(),
            Task::Plurality => plurality_dataset(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pos" => Ok(Task::Pos),
            "ner" => Ok(Task::Ner),
            "word_length" => Ok(Task::WordLength),
            "sentiment" => Ok(Task::Sentiment),
            "verb_tense" => Ok(Task::VerbTense),
            "plurality" => Ok(Task::Plurality),
            other => anyhow::bail!("unknown task '{other}'"),
        }
    }
}

/// Tasks probed when none are configured.
///
/// Plurality is excluded by default: its activations showed a separability
/// ratio of 0.0 in practice. Listing it in `--tasks` re-enables it.
pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::Pos,
        Task::Ner,
        Task::WordLength,
        Task::Sentiment,
        Task::VerbTense,
    ]
}

/// Count examples per label.
pub fn label_counts(examples: &[Example]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for example in examples {
        *counts.entry(example.label).or_insert(0) += 1;
    }
    counts
}

fn labeled(pairs: &[(&str, &str)], label: usize) -> Vec<Example> {
    pairs
        .iter()
        .map(|(text, target_word)| Example {
            text: (*text).to_string(),
            target_word: (*target_word).to_string(),
            label,
        })
        .collect()
}

fn pos_dataset() -> Vec<Example> {
    let nouns = [
        ("The kitchen smelled of fresh bread.", "kitchen"),
        ("A river flowed past the old mill.", "river"),
        ("The teacher wrote on the board.", "teacher"),
        ("Her garden bloomed in early spring.", "garden"),
        ("The engine rattled on cold mornings.", "engine"),
        ("A letter arrived after three weeks.", "letter"),
        ("The harbor filled with small boats.", "harbor"),
        ("His jacket hung by the door.", "jacket"),
        ("The library closed at nine.", "library"),
        ("A candle flickered on the table.", "candle"),
        ("The bridge crossed a narrow gorge.", "bridge"),
        ("The orchard produced sweet apples.", "orchard"),
    ];
    let verbs = [
        ("The children giggled at the clown.", "giggled"),
        ("She paints landscapes every summer.", "paints"),
        ("The dog chased the mail truck.", "chased"),
        ("He whistles while he works.", "whistles"),
        ("The crowd cheered for the runners.", "cheered"),
        ("They planted tomatoes in May.", "planted"),
        ("The kettle boiled on the stove.", "boiled"),
        ("She climbs the hill each morning.", "climbs"),
        ("The actor rehearsed his lines.", "rehearsed"),
        ("Waves crashed against the rocks.", "crashed"),
        ("He repairs bicycles for a living.", "repairs"),
        ("The choir sang until midnight.", "sang"),
    ];
    let adjectives = [
        ("The soup was delicious tonight.", "delicious"),
        ("A narrow path led to the cabin.", "narrow"),
        ("The ancient wall still stands.", "ancient"),
        ("Her cheerful voice filled the room.", "cheerful"),
        ("The sky turned a brilliant orange.", "brilliant"),
        ("He wore a shabby old coat.", "shabby"),
        ("The fragile vase survived the move.", "fragile"),
        ("A gentle breeze cooled the porch.", "gentle"),
        ("The muddy boots stayed outside.", "muddy"),
        ("Its velvety petals caught the light.", "velvety"),
        ("The spacious hall echoed loudly.", "spacious"),
        ("A bitter wind swept the square.", "bitter"),
    ];
    let adverbs = [
        ("She spoke softly to the child.", "softly"),
        ("He finished the exam quickly.", "quickly"),
        ("The train arrived punctually today.", "punctually"),
        ("They argued loudly next door.", "loudly"),
        ("The snow fell silently all night.", "silently"),
        ("She carefully folded the map.", "carefully"),
        ("He rarely visits the coast.", "rarely"),
        ("The choir sang beautifully on Sunday.", "beautifully"),
        ("The cat moved stealthily along the fence.", "stealthily"),
        ("He answered the question honestly.", "honestly"),
        ("The river rose steadily overnight.", "steadily"),
        ("She greeted everyone warmly.", "warmly"),
    ];

    let mut dataset = labeled(&nouns, 0);
    dataset.extend(labeled(&verbs, 1));
    dataset.extend(labeled(&adjectives, 2));
    dataset.extend(labeled(&adverbs, 3));
    dataset
}

fn ner_dataset() -> Vec<Example> {
    let common_nouns = [
        ("The doctor examined the patient.", "doctor"),
        ("A mountain rose above the valley.", "mountain"),
        ("The museum displayed old maps.", "museum"),
        ("The baker opened early today.", "baker"),
        ("A violin lay in its case.", "violin"),
        ("The airport was crowded at noon.", "airport"),
        ("The farmer sold eggs at the market.", "farmer"),
        ("A lighthouse guarded the bay.", "lighthouse"),
        ("The newspaper ran the story.", "newspaper"),
        ("The bakery smelled of cinnamon.", "bakery"),
        ("A tunnel passed under the hill.", "tunnel"),
        ("The orchestra tuned its strings.", "orchestra"),
        ("The village held a fair.", "village"),
        ("A glacier carved this valley.", "glacier"),
    ];
    let named_entities = [
        ("Paris glowed in the evening light.", "Paris"),
        ("Einstein published the paper in 1905.", "Einstein"),
        ("Amazon delivered the package early.", "Amazon"),
        ("Tokyo hosts millions of visitors.", "Tokyo"),
        ("Beethoven composed nine symphonies.", "Beethoven"),
        ("Brazil exports coffee worldwide.", "Brazil"),
        ("Shakespeare wrote many sonnets.", "Shakespeare"),
        ("Everest towers over the Himalayas.", "Everest"),
        ("Google indexed the new site.", "Google"),
        ("Cleopatra ruled ancient Egypt.", "Cleopatra"),
        ("Iceland sits on a volcanic ridge.", "Iceland"),
        ("Mozart toured Europe as a child.", "Mozart"),
        ("Toyota unveiled a new model.", "Toyota"),
        ("Darwin sailed on the Beagle.", "Darwin"),
    ];

    let mut dataset = labeled(&common_nouns, 0);
    dataset.extend(labeled(&named_entities, 1));
    dataset
}

fn word_length_dataset() -> Vec<Example> {
    // short: 3-5 letters, medium: 6-8, long: 9+
    let short = [
        ("The cat slept in the sun.", "cat"),
        ("The door creaked open slowly.", "door"),
        ("A lamp glowed in the window.", "lamp"),
        ("Fresh bread cooled on the rack.", "bread"),
        ("The river froze in January.", "river"),
        ("A glass fell from the shelf.", "glass"),
        ("The stone skipped across the pond.", "stone"),
        ("A fox crossed the icy road.", "fox"),
        ("The tree lost its last leaves.", "tree"),
        ("The chair wobbled on one leg.", "chair"),
        ("A cloud drifted past the peak.", "cloud"),
        ("The horse grazed near the fence.", "horse"),
    ];
    let medium = [
        ("The blanket kept them warm.", "blanket"),
        ("A lantern swung from the mast.", "lantern"),
        ("The station emptied after midnight.", "station"),
        ("The teacher graded the essays.", "teacher"),
        ("The morning began with fog.", "morning"),
        ("The village celebrated the harvest.", "village"),
        ("The library smelled of old paper.", "library"),
        ("The mountain vanished in the mist.", "mountain"),
        ("A sandwich waited on the counter.", "sandwich"),
        ("The painting hung slightly crooked.", "painting"),
        ("The computer hummed in the corner.", "computer"),
        ("A whisper carried down the hall.", "whisper"),
    ];
    let long = [
        ("The hurricane weakened offshore.", "hurricane"),
        ("The orchestra rehearsed all afternoon.", "orchestra"),
        ("A telescope pointed at the comet.", "telescope"),
        ("The university opened a new wing.", "university"),
        ("A watermelon cooled in the stream.", "watermelon"),
        ("The celebration lasted until dawn.", "celebration"),
        ("The photographer waited for the light.", "photographer"),
        ("The neighborhood planted new trees.", "neighborhood"),
        ("The temperature dropped sharply at dusk.", "temperature"),
        ("The electricity failed during the storm.", "electricity"),
        ("His grandmother told the old stories.", "grandmother"),
        ("The calculator ran out of power.", "calculator"),
    ];

    let mut dataset = labeled(&short, 0);
    dataset.extend(labeled(&medium, 1));
    dataset.extend(labeled(&long, 2));
    dataset
}

fn sentiment_dataset() -> Vec<Example> {
    let positive = [
        ("The concert was absolutely wonderful.", "wonderful"),
        ("She gave a delightful performance.", "delightful"),
        ("The meal tasted fantastic tonight.", "fantastic"),
        ("What a marvelous view from the top.", "marvelous"),
        ("The team made excellent progress.", "excellent"),
        ("His speech was truly inspiring.", "inspiring"),
        ("The garden looked gorgeous in June.", "gorgeous"),
        ("They had a splendid afternoon.", "splendid"),
        ("The news brought joyful tears.", "joyful"),
        ("Her kindness was heartwarming.", "heartwarming"),
        ("The trip turned out perfect.", "perfect"),
        ("A superb finish to the season.", "superb"),
    ];
    let negative = [
        ("The service was absolutely terrible.", "terrible"),
        ("A dreadful storm ruined the picnic.", "dreadful"),
        ("The traffic was horrible this morning.", "horrible"),
        ("His excuse sounded pathetic.", "pathetic"),
        ("The hotel room was disgusting.", "disgusting"),
        ("They suffered a miserable defeat.", "miserable"),
        ("The ending felt disappointing.", "disappointing"),
        ("An awful smell filled the basement.", "awful"),
        ("The meeting was painfully tedious.", "tedious"),
        ("Her remarks were needlessly cruel.", "cruel"),
        ("The forecast looks gloomy all week.", "gloomy"),
        ("A dismal crowd watched in silence.", "dismal"),
    ];
    let neutral = [
        ("The report is twelve pages long.", "report"),
        ("The train departs at seven.", "train"),
        ("Water boils at one hundred degrees.", "boils"),
        ("The store opens on weekdays.", "store"),
        ("The document requires two signatures.", "document"),
        ("The meeting is scheduled for Tuesday.", "scheduled"),
        ("The box contains forty screws.", "contains"),
        ("The road runs parallel to the river.", "parallel"),
        ("The building has six floors.", "floors"),
        ("The recipe calls for two eggs.", "recipe"),
        ("The ticket includes a return trip.", "ticket"),
        ("The survey covers three districts.", "survey"),
    ];

    let mut dataset = labeled(&positive, 0);
    dataset.extend(labeled(&negative, 1));
    dataset.extend(labeled(&neutral, 2));
    dataset
}

fn verb_tense_dataset() -> Vec<Example> {
    let present = [
        ("She walks to work every day.", "walks"),
        ("The baker kneads the dough at dawn.", "kneads"),
        ("He drinks coffee before meetings.", "drinks"),
        ("The children play in the yard.", "play"),
        ("The clock ticks on the mantel.", "ticks"),
        ("She teaches piano on Saturdays.", "teaches"),
        ("The ferry leaves at noon.", "leaves"),
        ("He writes letters by hand.", "writes"),
        ("The gardener waters the roses.", "waters"),
        ("They study in the evening.", "study"),
        ("The owl hunts after dark.", "hunts"),
        ("She runs along the canal.", "runs"),
    ];
    let past = [
        ("She walked to work yesterday.", "walked"),
        ("The baker kneaded the dough at dawn.", "kneaded"),
        ("He drank coffee before the meeting.", "drank"),
        ("The children played in the yard.", "played"),
        ("The clock ticked through the night.", "ticked"),
        ("She taught piano last year.", "taught"),
        ("The ferry left at noon.", "left"),
        ("He wrote letters by hand.", "wrote"),
        ("The gardener watered the roses.", "watered"),
        ("They studied all evening.", "studied"),
        ("The owl hunted after dark.", "hunted"),
        ("She ran along the canal.", "ran"),
    ];

    let mut dataset = labeled(&present, 0);
    dataset.extend(labeled(&past, 1));
    dataset
}

fn plurality_dataset() -> Vec<Example> {
    let singular = [
        ("The cat sits on the windowsill.", "cat"),
        ("A dog barks at strangers.", "dog"),
        ("The bird sings in the morning.", "bird"),
        ("A horse gallops across the field.", "horse"),
        ("The rabbit hops through the garden.", "rabbit"),
        ("The apple fell from the branch.", "apple"),
        ("A candle burns on the sill.", "candle"),
        ("The wheel squeaks on the cart.", "wheel"),
        ("The bell rings at noon.", "bell"),
        ("A leaf floated down the stream.", "leaf"),
        ("The key opens the cellar door.", "key"),
        ("The star faded before sunrise.", "star"),
        ("A wave washed over the pier.", "wave"),
        ("The book lay open on the desk.", "book"),
    ];
    let plural = [
        ("The cats sit on the windowsill.", "cats"),
        ("Dogs bark at strangers.", "dogs"),
        ("The birds sing in the morning.", "birds"),
        ("Horses gallop across the field.", "horses"),
        ("The rabbits hop through the garden.", "rabbits"),
        ("The apples fell from the branch.", "apples"),
        ("Candles burn on the sill.", "candles"),
        ("The wheels squeak on the cart.", "wheels"),
        ("The bells ring at noon.", "bells"),
        ("Leaves floated down the stream.", "leaves"),
        ("The keys open the cellar door.", "keys"),
        ("The stars faded before sunrise.", "stars"),
        ("Waves washed over the pier.", "waves"),
        ("The books lay open on the desk.", "books"),
    ];

    let mut dataset = labeled(&singular, 0);
    dataset.extend(labeled(&plural, 1));
    dataset
}

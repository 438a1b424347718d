//! Function-word tables for the supported languages
//!
//! Each table lists the closed-class words of one grammatical category.
//! A word may appear in several tables (e.g. "да" is both a conjunction
//! and a particle); the analyzer reports every category it belongs to.

use super::analyzer::WordTag;

pub(crate) const RUSSIAN_PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "ото", "до", "из",
    "изо", "у", "за", "над", "надо", "под", "подо", "про", "для", "без", "безо", "перед",
    "передо", "пред", "при", "через", "чрез", "между", "меж", "среди", "средь", "около",
    "возле", "вокруг", "после", "кроме", "вместо", "ради", "сквозь", "вдоль", "против",
    "из-за", "из-под", "по-над", "благодаря", "согласно", "навстречу", "вследствие", "ввиду",
    "вроде", "насчёт", "насчет", "мимо", "внутри", "вне", "близ", "подле", "позади", "впереди",
    "накануне", "спустя", "сверх", "помимо", "напротив", "относительно", "посредством",
];

pub(crate) const RUSSIAN_CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "или", "либо", "да", "что", "чтобы", "чтоб", "если", "когда", "как",
    "будто", "словно", "точно", "хотя", "хоть", "пока", "потому", "поэтому", "зато", "однако",
    "тоже", "также", "ибо", "раз", "едва", "итак", "то", "ни", "причем", "причём", "притом",
    "нежели", "чем", "коли", "ежели", "дабы", "затем", "благо", "лишь",
];

pub(crate) const RUSSIAN_PARTICLES: &[&str] = &[
    "не", "ни", "бы", "б", "же", "ж", "ли", "ль", "вот", "вон", "даже", "уже", "ещё", "еще",
    "только", "лишь", "ведь", "разве", "неужели", "пусть", "пускай", "давай", "да", "нет",
    "именно", "почти", "просто", "таки", "авось", "небось",
    "ишь", "мол", "дескать", "якобы", "вряд", "как", "уж",
];

pub(crate) const RUSSIAN_INTERJECTIONS: &[&str] = &[
    "ах", "ох", "ух", "эх", "ой", "ай", "эй", "ну", "увы", "ага", "ого", "ура", "тьфу",
    "фу", "ахти", "браво", "ау", "алло", "эге", "хм", "ба", "бац", "эхма", "батюшки",
];

pub(crate) const ENGLISH_PREPOSITIONS: &[&str] = &[
    "about", "above", "across", "after", "against", "along", "amid", "among", "around", "at",
    "before", "behind", "below", "beneath", "beside", "besides", "between", "beyond", "by",
    "despite", "down", "during", "except", "for", "from", "in", "inside", "into", "near",
    "of", "off", "on", "onto", "out", "outside", "over", "past", "per", "since", "through",
    "throughout", "to", "toward", "towards", "under", "underneath", "until", "till", "unto",
    "up", "upon", "via", "with", "within", "without",
];

pub(crate) const ENGLISH_CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "nor", "yet", "because", "although", "though", "while", "whereas",
    "if", "unless", "than", "whether", "either", "neither", "whenever", "wherever", "lest",
];

pub(crate) const ENGLISH_PARTICLES: &[&str] = &["not"];

pub(crate) const ENGLISH_INTERJECTIONS: &[&str] = &[
    "oh", "ah", "aha", "oops", "ouch", "alas", "hmm", "huh", "wow", "hey", "ugh", "hooray",
    "hurray", "bravo", "eh", "oho", "uh", "um", "er",
];

/// Forms of "to be"; treated as auxiliaries rather than content words
pub(crate) const ENGLISH_BE_FORMS: &[&str] =
    &["be", "am", "is", "are", "was", "were", "been", "being"];

/// Collect the function-word categories `word` belongs to in `tables`
pub(crate) fn lookup(word: &str, tables: &[(WordTag, &[&str])]) -> Vec<WordTag> {
    tables
        .iter()
        .filter(|(_, words)| words.contains(&word))
        .map(|(tag, _)| *tag)
        .collect()
}

pub(crate) fn russian_tables() -> [(WordTag, &'static [&'static str]); 4] {
    [
        (WordTag::Preposition, RUSSIAN_PREPOSITIONS),
        (WordTag::Conjunction, RUSSIAN_CONJUNCTIONS),
        (WordTag::Particle, RUSSIAN_PARTICLES),
        (WordTag::Interjection, RUSSIAN_INTERJECTIONS),
    ]
}

pub(crate) fn english_tables() -> [(WordTag, &'static [&'static str]); 5] {
    [
        (WordTag::Preposition, ENGLISH_PREPOSITIONS),
        (WordTag::Conjunction, ENGLISH_CONJUNCTIONS),
        (WordTag::Particle, ENGLISH_PARTICLES),
        (WordTag::Interjection, ENGLISH_INTERJECTIONS),
        (WordTag::AuxiliaryBe, ENGLISH_BE_FORMS),
    ]
}

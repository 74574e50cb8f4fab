use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Word tokens of at least two characters, starting with a letter.
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always","am","among","amongst","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","aren't","around","as","at",
            "be","became","because","become","becomes","been","before","beforehand","being","below","beside","besides","between","beyond","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","done","down","due","during",
            "each","eg","either","else","elsewhere","enough","etc","even","ever","every","everyone","everything","everywhere","except",
            "few","for","former","formerly","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","hence","her","here","here's","hereafter","hereby","herein","hers","herself","him","himself","his","how","how's","however",
            "i","i'd","i'll","i'm","i've","ie","if","in","indeed","into","is","isn't","it","it's","its","itself",
            "just","last","latter","least","less","let's","ltd",
            "made","many","may","me","meanwhile","might","more","moreover","most","mostly","much","must","mustn't","my","myself",
            "namely","neither","never","nevertheless","next","no","nobody","none","nor","not","nothing","now","nowhere",
            "of","off","often","on","once","only","onto","or","other","others","otherwise","ought","our","ours","ourselves","out","over","own",
            "per","perhaps","please","rather","re",
            "same","seem","seemed","seeming","seems","several","she","she'd","she'll","she's","should","shouldn't","since","so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such",
            "than","that","that's","the","their","theirs","them","themselves","then","thence","there","there's","thereafter","thereby","therefore","therein","these","they","they'd","they'll","they're","they've","this","those","though","through","throughout","thus","to","together","too","toward","towards",
            "under","until","up","upon","us",
            "very","via",
            "was","wasn't","we","we'd","we'll","we're","we've","well","were","weren't","what","what's","whatever","when","when's","whence","whenever","where","where's","whereas","whereby","wherein","whether","which","while","who","who's","whoever","whole","whom","whose","why","why's","will","with","within","without","won't","would","wouldn't",
            "yet","you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Tokenize text into (term, position) using NFKC normalization, lowercase,
/// English stop-word removal, and stemming. Positions count every word
/// token, including the dropped stop-words.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if is_stopword(token) {
            continue;
        }
        let stem = STEMMER.stem(token).to_string();
        tokens.push((stem, pos));
    }
    tokens
}

/// Terms of `text` without positions, in order of appearance.
pub fn terms(text: &str) -> impl Iterator<Item = String> {
    tokenize(text).into_iter().map(|(term, _)| term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|(w, _)| w == "run"));
    }

    #[test]
    fn single_letters_are_not_tokens() {
        let words: Vec<String> = terms("x y z virus").collect();
        assert_eq!(words, vec!["virus".to_string()]);
    }

    #[test]
    fn positions_skip_stopwords() {
        let t = tokenize("the coronavirus spike");
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].1, 1);
        assert_eq!(t[1].1, 2);
    }
}

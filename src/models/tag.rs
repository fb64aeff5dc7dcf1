//! Tag model

use serde::{Deserialize, Serialize};

/// Tag entity, shared by all users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Pull `#Word` tokens out of a hashtag string.
///
/// Leading `#` characters are stripped, empty tokens dropped and duplicates
/// removed while keeping first-seen order.
pub fn parse_hashtags(hashtags: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in hashtags.split(|c: char| c.is_whitespace() || c == ',') {
        let name = token.trim_start_matches('#').trim();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hashtags() {
        assert_eq!(
            parse_hashtags("#MachineLearning #NLP, #nlp  #"),
            vec!["MachineLearning".to_string(), "NLP".to_string()]
        );
        assert!(parse_hashtags("   ").is_empty());
    }
}

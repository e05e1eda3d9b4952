/// Checks for names that end up in a `player <name>` command or a skin URL
use thiserror::Error;
use wss_protocol::PlayerName;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no player name given")]
    EmptyName,

    #[error("player name is {0} bytes, the game allows at most 16")]
    NameTooLong(usize),

    #[error("player name has {ch:?} at position {position}, only letters, digits and '_' are sent to the server")]
    InvalidCharacter { ch: char, position: usize },
}

/// Validates a name and returns it as a skin cache key.
pub fn player_name(name: &str) -> Result<PlayerName, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if let Some((position, ch)) = name
        .chars()
        .enumerate()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ValidationError::InvalidCharacter { ch, position });
    }

    PlayerName::from(name).map_err(|_| ValidationError::NameTooLong(name.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_the_server_knows() {
        assert_eq!(player_name("Notch").unwrap().as_str(), "Notch");
        assert!(player_name("jeb_").is_ok());
        assert!(player_name("x").is_ok());
        assert!(player_name("Sixteen_Chars_01").is_ok());
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(player_name(""), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_name_over_cache_key_capacity() {
        assert_eq!(
            player_name("Seventeen_Chars_1"),
            Err(ValidationError::NameTooLong(17))
        );
    }

    #[test]
    fn test_names_that_would_leak_into_commands_or_urls() {
        assert_eq!(
            player_name("Steve Alex"),
            Err(ValidationError::InvalidCharacter { ch: ' ', position: 5 })
        );
        assert_eq!(
            player_name("../skins"),
            Err(ValidationError::InvalidCharacter { ch: '.', position: 0 })
        );
        assert_eq!(
            player_name("Steve?size=64"),
            Err(ValidationError::InvalidCharacter { ch: '?', position: 5 })
        );
    }
}

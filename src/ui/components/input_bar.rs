use std::path::PathBuf;

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Text(String),
    Image { path: PathBuf, caption: Option<String> },
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse(line: &str) -> InputAction {
    let line = line.trim();
    if line.is_empty() {
        return InputAction::Empty;
    }
    if line == "/quit" {
        return InputAction::Quit;
    }
    if let Some(rest) = line.strip_prefix("/image") {
        let rest = rest.trim();
        if rest.is_empty() {
            return InputAction::Invalid("usage: /image <path> [caption]".into());
        }
        let (path, caption) = match rest.split_once(char::is_whitespace) {
            Some((path, caption)) => (path, Some(caption.trim().to_string())),
            None => (rest, None),
        };
        return InputAction::Image {
            path: PathBuf::from(path),
            caption: caption.filter(|c| !c.is_empty()),
        };
    }
    InputAction::Text(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse("  hello there "), InputAction::Text("hello there".into()));
        assert_eq!(parse(""), InputAction::Empty);
        assert_eq!(parse("/quit"), InputAction::Quit);
        assert_eq!(
            parse("/image cat.png look at this"),
            InputAction::Image {
                path: PathBuf::from("cat.png"),
                caption: Some("look at this".into())
            }
        );
        assert_eq!(
            parse("/image cat.png"),
            InputAction::Image {
                path: PathBuf::from("cat.png"),
                caption: None
            }
        );
        assert!(matches!(parse("/image"), InputAction::Invalid(_)));
    }
}

/// A name with its trailing identifier token removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrippedName {
    pub name: String,
    pub identifier: Option<String>,
}

/// Split off the last whitespace-delimited token of `name` as the identifier.
///
/// `extension` is the file extension including its leading dot (empty for
/// directories). When the last token ends with it, the extension is removed
/// before the token is taken as the identifier, and re-appended to the
/// cleaned name. Names made of a single token are returned unchanged.
pub fn strip_identifier(name: &str, extension: &str) -> StrippedName {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let unchanged = || StrippedName {
        name: name.to_string(),
        identifier: None,
    };

    let Some((last, words)) = tokens.split_last() else {
        return unchanged();
    };
    if words.is_empty() {
        return unchanged();
    }

    let identifier = last.strip_suffix(extension).unwrap_or(*last);
    if identifier.is_empty() {
        return unchanged();
    }

    StrippedName {
        name: format!("{}{extension}", words.join(" ")),
        identifier: Some(identifier.to_string()),
    }
}

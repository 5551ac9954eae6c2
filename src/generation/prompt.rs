//! Prompt assembly.

/// Separator placed between the system instruction and the user text.
pub const PROMPT_SEPARATOR: &str = "\n\n";

/// Declared target format for generated output (GBNF).
///
/// A single JSON object with fixed string keys and a string array of tags.
/// This grammar documents the expected shape only; token selection is plain
/// argmax and completion is decided by the JSON completeness detector.
pub const OUTPUT_GRAMMAR: &str = r#"
root        ::= ws object ws

object      ::= "{" ws
                 '"category"' ws ":" ws category ws "," ws
                 '"name"' ws ":" ws string ws "," ws
                 '"color"' ws ":" ws string ws "," ws
                 '"detailType"' ws ":" ws string ws "," ws
                 '"pattern"' ws ":" ws string ws "," ws
                 '"brand"' ws ":" ws string ws "," ws
                 '"tags"' ws ":" ws array ws "," ws
                 '"description"' ws ":" ws string ws
                 "}"

category    ::= '"TOP"' | '"BOTTOM"' | '"OUTER"' | '"SHOES"' | '"ACCESSORY"' | '"OTHER"'

array       ::= "[" ws (string (ws "," ws string)*)? ws "]"

string      ::= '"' characters '"'
characters  ::= (char)*
char        ::= [^"\\\x00-\x1F] | escape
escape      ::= '\\' (["\\/bfnrt] | 'u' hex hex hex hex)
hex         ::= [0-9a-fA-F]

ws          ::= ([ \t\n\r])*
"#;

/// Join the system instruction and user text. Absent inputs become empty.
pub fn assemble(system_prompt: Option<&str>, user_text: Option<&str>) -> String {
    let system = system_prompt.unwrap_or_default();
    let user = user_text.unwrap_or_default();
    let mut prompt = String::with_capacity(system.len() + PROMPT_SEPARATOR.len() + user.len());
    prompt.push_str(system);
    prompt.push_str(PROMPT_SEPARATOR);
    prompt.push_str(user);
    prompt
}

/// Prompt for the vision path: guarantees the media marker is present.
///
/// If `prompt` already contains `marker` it is returned unchanged, otherwise
/// a newline and the marker are appended.
pub fn with_media_marker(prompt: &str, marker: &str) -> String {
    if marker.is_empty() || prompt.contains(marker) {
        return prompt.to_string();
    }
    let mut out = String::with_capacity(prompt.len() + 1 + marker.len());
    out.push_str(prompt);
    out.push('\n');
    out.push_str(marker);
    out
}

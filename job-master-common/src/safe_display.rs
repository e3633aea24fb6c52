/// A redacted, log-safe rendering of a value that may otherwise carry
/// sensitive fields (secrets, tokens, raw task payloads).
///
/// Config structs and error types implement this alongside `Debug` so that
/// any message destined for a log line or an RPC response has gone through
/// an explicit, reviewed redaction rather than falling back to `{:?}`.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;

    /// Convenience for nesting: indents every line of `to_safe_string` by
    /// two spaces, matching the block layout used when one config section
    /// embeds another.
    fn to_safe_string_indented(&self) -> String {
        self.to_safe_string()
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

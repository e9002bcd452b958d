/// Serde default helper that returns `true`.
pub(crate) fn default_true() -> bool {
    true
}

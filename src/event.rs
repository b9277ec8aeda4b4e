#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchEvent {
    // Per-item lifecycle
    ItemStarted(String),
    ItemCompleted(String),
    ItemFailed(String, String),
    ItemCancelled(String),

    // Overall progress (done, total)
    Progress(usize, usize),

    // General
    LogMessage(String),
}

/// Return this error from a virtual user's behaviour to indicate that the user is bailing.
///
/// Use it when a user hits a condition it cannot recover from, such as a target host that refuses
/// every connection, while the rest of the run should continue with the other users.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self::new("Virtual user is bailing")
    }
}

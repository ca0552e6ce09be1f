use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Chat(String),
    Login,
}

impl Route {
    /// Unknown paths fall back to the home screen.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["auth"] => Self::Login,
            ["chat", id] => Self::Chat((*id).to_string()),
            _ => Self::Home,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Chat(id) => format!("/chat/{id}"),
            Self::Login => "/auth".to_string(),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Chat(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

//! Rendering client lifecycle states

use std::fmt;

/// Where a rendering client is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Constructed, nothing allocated
    Created,
    /// Texture allocated, accepting paints
    Initialized,
    /// A page has been requested from the engine
    WebsiteOpen,
    /// At least one frame has been rendered
    Rendering,
    /// Torn down; every further call fails
    CleanedUp,
}

impl ClientState {
    /// Whether the host may render frames
    pub fn can_render(self) -> bool {
        matches!(self, Self::WebsiteOpen | Self::Rendering)
    }

    /// Whether the host may navigate
    pub fn can_open_website(self) -> bool {
        matches!(self, Self::Initialized | Self::WebsiteOpen | Self::Rendering)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::CleanedUp
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::WebsiteOpen => "website-open",
            Self::Rendering => "rendering",
            Self::CleanedUp => "cleaned-up",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_allowed_states() {
        assert!(!ClientState::Created.can_render());
        assert!(!ClientState::Initialized.can_render());
        assert!(ClientState::WebsiteOpen.can_render());
        assert!(ClientState::Rendering.can_render());
        assert!(!ClientState::CleanedUp.can_render());
    }

    #[test]
    fn test_open_website_allowed_states() {
        assert!(!ClientState::Created.can_open_website());
        assert!(ClientState::Initialized.can_open_website());
        assert!(ClientState::Rendering.can_open_website());
        assert!(!ClientState::CleanedUp.can_open_website());
    }

    #[test]
    fn test_display() {
        assert_eq!(ClientState::WebsiteOpen.to_string(), "website-open");
        assert!(ClientState::CleanedUp.is_terminal());
    }
}

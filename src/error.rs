//! Error types for arcnav.

use thiserror::Error;

/// Hard failures: configuration, graph loading, I/O.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph load error: {0}")]
    GraphLoad(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

/// Outcome of the most recent failing navigation operation.
///
/// Boolean-returning calls on the public surface report `false` and leave
/// one of these readable via `last_error()`; recoverable conditions never
/// abort the control loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavFailure {
    /// The route graph has no usable edges.
    GraphEmpty,
    /// Empty destination parameter.
    EmptyDestination,
    /// Start point too far from the route network.
    StartPointTooFar,
    /// Named destination not present in the graph.
    DestinationNotFound,
    /// Graph search failed; movement degraded to a direct route.
    PathNotFound,
    /// Destination too far from the route network.
    DestinationPointTooFar,
    /// Already within combined radii of the destination.
    DestinationTooClose,
    /// Drifted off the route and regeneration failed; route aborted.
    TargetLost,
    /// Informational: the graph was skipped in favor of a straight line.
    DirectRoute,
}

impl std::fmt::Display for NavFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NavFailure::GraphEmpty => "route graph is empty",
            NavFailure::EmptyDestination => "destination is empty",
            NavFailure::StartPointTooFar => "start point too far from route network",
            NavFailure::DestinationNotFound => "destination not found",
            NavFailure::PathNotFound => "no path found",
            NavFailure::DestinationPointTooFar => "destination too far from route network",
            NavFailure::DestinationTooClose => "destination too close",
            NavFailure::TargetLost => "route lost after drifting off course",
            NavFailure::DirectRoute => "direct route",
        };
        f.write_str(s)
    }
}

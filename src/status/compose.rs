use crate::{config::RenderConfig, wakatime::ActivitySnapshot};

use super::format::{format_duration, render_progress_bar, shorten_project_name, truncate};

/// Project names longer than this get cut so one segment can't crowd out the
/// rest of the line.
const MAX_PROJECT_CHARS: usize = 30;

const UNAVAILABLE_TEXT: &str = "Status temporarily unavailable";

/// What gets pushed to the profile: an emoji and a bounded-length line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub emoji: String,
    pub text: String,
}

/// Turns a snapshot into a status line. Pure: the same snapshot and config
/// always produce byte-identical output.
pub struct StatusComposer {
    config: RenderConfig,
}

impl StatusComposer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, snapshot: &ActivitySnapshot) -> StatusMessage {
        let icons = &self.config.icons;
        let mut segments = Vec::with_capacity(4);

        segments.push(format!(
            "{} {}",
            icons.time,
            format_duration(snapshot.total_seconds_today)
        ));

        if let Some(project) = &snapshot.current_project {
            let name = truncate(shorten_project_name(project), MAX_PROJECT_CHARS);
            segments.push(match &snapshot.current_language {
                Some(language) => format!("{} {} ({})", icons.project, name, language),
                None => format!("{} {}", icons.project, name),
            });
        }

        let fraction = (snapshot.total_seconds_today as f64
            / self.config.daily_goal_seconds as f64)
            .min(1.0);
        segments.push(format!(
            "{} {}%",
            render_progress_bar(
                fraction,
                self.config.progress_bar_width,
                &icons.progress_filled,
                &icons.progress_empty,
            ),
            (fraction * 100.0).round() as u32
        ));

        if let Some(language) = &snapshot.most_used_language {
            segments.push(language.clone());
        }

        StatusMessage {
            emoji: if snapshot.is_active {
                icons.active.clone()
            } else {
                icons.idle.clone()
            },
            text: truncate(
                &segments.join(&self.config.separator),
                self.config.max_message_length,
            ),
        }
    }

    /// Fixed message published when the day's activity couldn't be fetched.
    pub fn unavailable(&self) -> StatusMessage {
        StatusMessage {
            emoji: self.config.icons.error.clone(),
            text: UNAVAILABLE_TEXT.to_string(),
        }
    }
}

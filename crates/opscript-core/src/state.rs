//! Per-run memory of "apply to all" decisions.

use std::time::{Duration, Instant};

/// Flags recording which failure and confirmation classes the user already
/// answered with an "All" decision during the current run.
///
/// Owned by the caller and passed by reference into the builder and the
/// worker, so independent runs never share decisions.
#[derive(Debug, Clone)]
pub struct BuildState {
    pub confirm_ads_loss_all: bool,
    pub confirm_ads_loss_skip_all: bool,
    pub confirm_copy_link_content_all: bool,
    pub confirm_copy_link_content_skip_all: bool,
    pub ads_read_ignore_all: bool,
    pub file_error_skip_all: bool,
    pub name_too_long_skip_all: bool,
    pub dir_name_too_long_skip_all: bool,
    pub target_name_too_long_skip_all: bool,
    pub target_dir_name_too_long_skip_all: bool,
    pub source_dir_name_too_long_skip_all: bool,
    pub list_dir_skip_all: bool,
    pub fat32_too_big_skip_all: bool,
    pub link_target_size_ignore_all: bool,

    pub overwrite_all: bool,
    pub overwrite_skip_all: bool,
    pub ads_overwrite_all: bool,
    pub ads_overwrite_skip_all: bool,
    pub hidden_or_system_all: bool,
    pub hidden_or_system_skip_all: bool,
    pub cannot_move_skip_all: bool,
    pub ads_open_skip_all: bool,
    pub ads_open_ignore_all: bool,
    pub set_attrs_skip_all: bool,
    pub set_attrs_ignore_all: bool,
    pub copy_perm_skip_all: bool,
    pub copy_perm_ignore_all: bool,
    pub dir_time_ignore_all: bool,
    pub encryption_loss_all: bool,
    pub encryption_loss_skip_all: bool,
    pub delete_nonempty_all: bool,
    pub delete_nonempty_skip_all: bool,

    /// Last time the worker reached out to the observer.
    pub last_interaction: Instant,
}

impl BuildState {
    pub fn new() -> Self {
        Self {
            confirm_ads_loss_all: false,
            confirm_ads_loss_skip_all: false,
            confirm_copy_link_content_all: false,
            confirm_copy_link_content_skip_all: false,
            ads_read_ignore_all: false,
            file_error_skip_all: false,
            name_too_long_skip_all: false,
            dir_name_too_long_skip_all: false,
            target_name_too_long_skip_all: false,
            target_dir_name_too_long_skip_all: false,
            source_dir_name_too_long_skip_all: false,
            list_dir_skip_all: false,
            fat32_too_big_skip_all: false,
            link_target_size_ignore_all: false,
            overwrite_all: false,
            overwrite_skip_all: false,
            ads_overwrite_all: false,
            ads_overwrite_skip_all: false,
            hidden_or_system_all: false,
            hidden_or_system_skip_all: false,
            cannot_move_skip_all: false,
            ads_open_skip_all: false,
            ads_open_ignore_all: false,
            set_attrs_skip_all: false,
            set_attrs_ignore_all: false,
            copy_perm_skip_all: false,
            copy_perm_ignore_all: false,
            dir_time_ignore_all: false,
            encryption_loss_all: false,
            encryption_loss_skip_all: false,
            delete_nonempty_all: false,
            delete_nonempty_skip_all: false,
            last_interaction: Instant::now(),
        }
    }

    /// Forget every decision and restart the interaction clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn mark_interaction(&mut self) {
        self.last_interaction = Instant::now();
    }

    pub fn since_interaction(&self) -> Duration {
        self.last_interaction.elapsed()
    }
}

impl Default for BuildState {
    fn default() -> Self {
        Self::new()
    }
}

//! Filesystem event handler for the profile directory watcher.

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::file::{is_dotfile, is_profile_file, load_file, Shared};

/// Apply one watcher event to the shared profile map.
pub(super) fn handle_fs_event(event: &Event, shared: &Shared) {
    for path in &event.paths {
        // Dotfiles include our own `.tmp` files written before a rename.
        if !is_profile_file(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Name(_)) => {
                // A rename reports the old name too; treat a vanished path as removal.
                if !path.exists() {
                    if let Some(id) = shared.remove_path(path) {
                        info!(profile_id = id, path = %path.display(), "removed profile after rename");
                    }
                    continue;
                }
                match load_file(path) {
                    Ok(profile) => {
                        let profile_id = profile.id;
                        let action = shared.upsert(path, profile);
                        info!(profile_id, ?action, path = %path.display(), "hot-reloaded profile");
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to parse profile during hot-reload, keeping previous version"
                        );
                    }
                }
            }
            EventKind::Remove(RemoveKind::File | RemoveKind::Any) => {
                if let Some(id) = shared.remove_path(path) {
                    info!(profile_id = id, path = %path.display(), "removed profile after file deletion");
                }
            }
            _ => {}
        }
    }
}

use std::collections::HashMap;

use dbus::Path;
use futures_channel::mpsc;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::event::Event;
use crate::utils::{get_path_array, get_string};
use crate::JOB_IFACE;

const FORMAT_ERASE_OPERATION: &str = "format-erase";
const FORMAT_MKFS_OPERATION: &str = "format-mkfs";
const MOUNT_OPERATION: &str = "filesystem-mount";
const UNMOUNT_OPERATION: &str = "filesystem-unmount";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobKind {
    FormatErase,
    FormatMkfs,
    Mount,
    Unmount,
}

impl JobKind {
    fn from_operation(operation: &str) -> Option<JobKind> {
        match operation {
            FORMAT_ERASE_OPERATION => Some(JobKind::FormatErase),
            FORMAT_MKFS_OPERATION => Some(JobKind::FormatMkfs),
            MOUNT_OPERATION => Some(JobKind::Mount),
            UNMOUNT_OPERATION => Some(JobKind::Unmount),
            _ => None,
        }
    }
}

/// A job observation: the raw event, the object paths the job targets
/// (from its `Objects` property), and whether the job has finished.
#[derive(Debug, Clone)]
pub(crate) struct JobEvent {
    pub event: Event,
    pub paths: Vec<String>,
    pub was_completed: bool,
}

/// The add/remove state machine for the ephemeral job objects UDisks2
/// publishes while executing long operations.
#[derive(Debug, Default)]
struct JobTracker {
    running: HashMap<Path<'static>, (JobKind, Vec<String>)>,
}

impl JobTracker {
    /// Classifies a job addition by its `Operation` property. Unknown
    /// operations are ignored.
    fn observe_added(&mut self, event: &Event) -> Option<(JobKind, JobEvent)> {
        let job = event.props.get(JOB_IFACE)?;
        let operation = job.get("Operation").and_then(get_string)?;
        let kind = JobKind::from_operation(&operation)?;
        let paths = job.get("Objects").map(get_path_array).unwrap_or_default();
        self.running
            .insert(event.path.clone(), (kind, paths.clone()));
        Some((
            kind,
            JobEvent {
                event: event.clone(),
                paths,
                was_completed: false,
            },
        ))
    }

    /// Completes a previously observed job. Removals for jobs never seen
    /// as added, or removals that do not drop the job interface, are
    /// ignored.
    fn observe_removed(&mut self, event: &Event) -> Option<(JobKind, JobEvent)> {
        if !event.interfaces.iter().any(|i| i == JOB_IFACE) {
            return None;
        }
        let (kind, paths) = self.running.remove(&event.path)?;
        Some((
            kind,
            JobEvent {
                event: event.clone(),
                paths,
                was_completed: true,
            },
        ))
    }
}

/// Consumes the dispatcher's job event streams and fans completions out to
/// one stream per operation kind.
pub(crate) struct JobManager {
    pub format_erase_jobs: mpsc::UnboundedReceiver<JobEvent>,
    pub format_mkfs_jobs: mpsc::UnboundedReceiver<JobEvent>,
    pub mount_jobs: mpsc::UnboundedReceiver<JobEvent>,
    pub unmount_jobs: mpsc::UnboundedReceiver<JobEvent>,
    pub task: JoinHandle<()>,
}

impl JobManager {
    pub(crate) fn new(
        mut additions: mpsc::UnboundedReceiver<Event>,
        mut removals: mpsc::UnboundedReceiver<Event>,
    ) -> JobManager {
        let (erase_tx, format_erase_jobs) = mpsc::unbounded();
        let (mkfs_tx, format_mkfs_jobs) = mpsc::unbounded();
        let (mount_tx, mount_jobs) = mpsc::unbounded();
        let (unmount_tx, unmount_jobs) = mpsc::unbounded();

        let task = tokio::spawn(async move {
            let mut tracker = JobTracker::default();
            loop {
                let observed = tokio::select! {
                    event = additions.next() => match event {
                        Some(event) => tracker.observe_added(&event),
                        None => break,
                    },
                    event = removals.next() => match event {
                        Some(event) => tracker.observe_removed(&event),
                        None => break,
                    },
                };

                if let Some((kind, job)) = observed {
                    log::trace!(
                        "job {:?} for {} (completed: {})",
                        kind,
                        job.event.path,
                        job.was_completed
                    );
                    let target = match kind {
                        JobKind::FormatErase => &erase_tx,
                        JobKind::FormatMkfs => &mkfs_tx,
                        JobKind::Mount => &mount_tx,
                        JobKind::Unmount => &unmount_tx,
                    };
                    let _ = target.unbounded_send(job);
                }
            }
        });

        JobManager {
            format_erase_jobs,
            format_mkfs_jobs,
            mount_jobs,
            unmount_jobs,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{vpaths, vstr};
    use crate::{InterfacesAndProperties, VariantMap};

    fn job_added(path: &str, operation: &str, objects: &[&str]) -> Event {
        let mut job = VariantMap::new();
        job.insert("Operation".to_owned(), vstr(operation));
        job.insert("Objects".to_owned(), vpaths(objects));
        let mut props = InterfacesAndProperties::new();
        props.insert(JOB_IFACE.to_owned(), job);
        Event::added(path.to_owned().into(), props)
    }

    fn job_removed(path: &str) -> Event {
        Event::removed(path.to_owned().into(), vec![JOB_IFACE.to_owned()])
    }

    #[test]
    fn classifies_the_four_known_operations() {
        assert_eq!(
            JobKind::from_operation("format-erase"),
            Some(JobKind::FormatErase)
        );
        assert_eq!(
            JobKind::from_operation("format-mkfs"),
            Some(JobKind::FormatMkfs)
        );
        assert_eq!(
            JobKind::from_operation("filesystem-mount"),
            Some(JobKind::Mount)
        );
        assert_eq!(
            JobKind::from_operation("filesystem-unmount"),
            Some(JobKind::Unmount)
        );
        assert_eq!(JobKind::from_operation("ata-smart-selftest"), None);
    }

    #[test]
    fn jobs_complete_through_add_then_remove() {
        let mut tracker = JobTracker::default();
        let added = job_added(
            "/org/freedesktop/UDisks2/jobs/1",
            "filesystem-mount",
            &["/org/freedesktop/UDisks2/block_devices/sdb1"],
        );

        let (kind, job) = tracker.observe_added(&added).unwrap();
        assert_eq!(kind, JobKind::Mount);
        assert!(!job.was_completed);
        assert_eq!(
            job.paths,
            vec!["/org/freedesktop/UDisks2/block_devices/sdb1".to_owned()]
        );

        let (kind, job) = tracker
            .observe_removed(&job_removed("/org/freedesktop/UDisks2/jobs/1"))
            .unwrap();
        assert_eq!(kind, JobKind::Mount);
        assert!(job.was_completed);
        assert_eq!(
            job.paths,
            vec!["/org/freedesktop/UDisks2/block_devices/sdb1".to_owned()]
        );
    }

    #[test]
    fn unknown_operations_are_ignored() {
        let mut tracker = JobTracker::default();
        let added = job_added("/org/freedesktop/UDisks2/jobs/1", "drive-eject", &[]);
        assert!(tracker.observe_added(&added).is_none());
        assert!(tracker
            .observe_removed(&job_removed("/org/freedesktop/UDisks2/jobs/1"))
            .is_none());
    }

    #[test]
    fn removals_without_a_matching_add_are_ignored() {
        let mut tracker = JobTracker::default();
        assert!(tracker
            .observe_removed(&job_removed("/org/freedesktop/UDisks2/jobs/9"))
            .is_none());
    }

    #[test]
    fn removals_keeping_the_job_interface_are_ignored() {
        let mut tracker = JobTracker::default();
        tracker.observe_added(&job_added(
            "/org/freedesktop/UDisks2/jobs/1",
            "format-mkfs",
            &[],
        ));

        let other = Event::removed(
            "/org/freedesktop/UDisks2/jobs/1".to_owned().into(),
            vec!["org.freedesktop.DBus.Properties".to_owned()],
        );
        assert!(tracker.observe_removed(&other).is_none());

        // the job is still tracked and completes normally afterwards
        assert!(tracker
            .observe_removed(&job_removed("/org/freedesktop/UDisks2/jobs/1"))
            .is_some());
    }
}

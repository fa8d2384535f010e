use std::sync::Arc;
use std::time::Duration;

use dbus::arg::Variant;
use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
use dbus::nonblock::{Proxy, SyncConnection};
use futures_channel::mpsc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, EventStreams};
use crate::drive::Drive;
use crate::event::{props_have_mountpoints, Event};
use crate::jobs::{JobEvent, JobManager};
use crate::registry::{path_kind, DriveMap, PathKind, WatcherState};
use crate::utils::bytes_to_string;
use crate::{
    Error, KeyVariant, BLOCK_IFACE, DEST, FILESYSTEM_IFACE, PARTITION_IFACE,
    PARTITION_TABLE_IFACE,
};

const METHOD_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const PROPERTY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Delays between checks that a freshly reported mountpoint exists on disk.
const MOUNTPOINT_WAIT_SECONDS: [u64; 6] = [1, 2, 3, 4, 5, 10];

const DEFAULT_FORMAT_FS: &str = "vfat";

/// Published when a drive becomes mounted: the drive's object path and the
/// mountpoint its filesystem appeared at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEvent {
    pub path: dbus::Path<'static>,
    pub mountpoint: String,
}

/// Watches UDisks2 for the arrival and departure of removable block
/// devices and coordinates their mount, unmount and reformat lifecycle.
///
/// Subscribe to the streams of interest first, then call [`init`]
/// (subscriptions made afterwards are not seen by the running event loop).
/// All streams are unbuffered: a slow consumer exerts back-pressure on the
/// watcher.
///
/// ```no_run
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use futures_util::StreamExt;
///
/// // Connect to the D-Bus system bus (this is blocking, unfortunately).
/// let (resource, conn) = dbus_tokio::connection::new_system_sync().unwrap();
///
/// // The resource is a task that should be spawned onto a tokio compatible
/// // reactor ASAP. If the resource ever finishes, you lost connection to D-Bus.
/// tokio::spawn(async {
///     let err = resource.await;
///     panic!("Lost connection to D-Bus: {}", err);
/// });
///
/// let mut watcher = udisks2_watcher::StorageWatcher::new(conn, vec!["vfat".into()]);
/// let (mut block_added, _block_errors) = watcher.subscribe_add_events();
/// watcher.init().await.unwrap();
///
/// while let Some(event) = block_added.next().await {
///     watcher.mount(&event);
/// }
/// # });
/// ```
///
/// [`init`]: StorageWatcher::init
pub struct StorageWatcher {
    conn: Arc<SyncConnection>,
    state: Arc<Mutex<WatcherState>>,
    supported_filesystems: Vec<String>,
    thumb_only: bool,
    block_added: Option<mpsc::Sender<Event>>,
    block_error: Option<mpsc::Sender<Error>>,
    block_device: Option<mpsc::Sender<bool>>,
    mount_removed: Option<mpsc::Sender<String>>,
    umount_completed: Option<mpsc::Sender<String>>,
    unmount_errors: Option<mpsc::Sender<Error>>,
    mount_completed: Option<mpsc::Sender<MountEvent>>,
    mount_errors: Option<mpsc::Sender<Error>>,
    format_completed: Option<mpsc::Sender<Event>>,
    format_errors: Option<mpsc::Sender<Error>>,
    dispatcher: Option<Dispatcher>,
    loop_task: Option<JoinHandle<()>>,
    job_task: Option<JoinHandle<()>>,
}

impl StorageWatcher {
    /// Creates a watcher over `conn`. `supported_filesystems` restricts
    /// automounting to blocks whose `IdType` is listed; an empty list
    /// disables the restriction.
    pub fn new(conn: Arc<SyncConnection>, supported_filesystems: Vec<String>) -> StorageWatcher {
        StorageWatcher {
            conn,
            state: Arc::new(Mutex::new(WatcherState::default())),
            supported_filesystems,
            thumb_only: false,
            block_added: None,
            block_error: None,
            block_device: None,
            mount_removed: None,
            umount_completed: None,
            unmount_errors: None,
            mount_completed: None,
            mount_errors: None,
            format_completed: None,
            format_errors: None,
            dispatcher: None,
            loop_task: None,
            job_task: None,
        }
    }

    /// Restricts automounting to thumb drives: the parent drive must be
    /// removable and list `"thumb"` in its `MediaCompatibility`.
    pub fn set_thumb_only(&mut self, thumb_only: bool) {
        self.thumb_only = thumb_only;
    }

    pub fn is_fs_valid(&self, fs: &str) -> bool {
        is_supported_filesystem(&self.supported_filesystems, fs)
    }

    /// Newly added mountable block devices that passed the automount
    /// policy, paired with the errors hit while classifying additions.
    pub fn subscribe_add_events(&mut self) -> (mpsc::Receiver<Event>, mpsc::Receiver<Error>) {
        let (added_tx, added_rx) = mpsc::channel(0);
        let (error_tx, error_rx) = mpsc::channel(0);
        self.block_added = Some(added_tx);
        self.block_error = Some(error_tx);
        (added_rx, error_rx)
    }

    /// Mountpoints whose backing object lost its filesystem interface.
    pub fn subscribe_remove_events(&mut self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(0);
        self.mount_removed = Some(tx);
        rx
    }

    /// Pulses `true` for every block-device addition and `false` for every
    /// removal event.
    pub fn subscribe_block_device_events(&mut self) -> mpsc::Receiver<bool> {
        let (tx, rx) = mpsc::channel(0);
        self.block_device = Some(tx);
        rx
    }

    /// Block paths whose unmount job completed, paired with unmount errors.
    pub fn subscribe_unmount_events(&mut self) -> (mpsc::Receiver<String>, mpsc::Receiver<Error>) {
        let (completed_tx, completed_rx) = mpsc::channel(0);
        let (error_tx, error_rx) = mpsc::channel(0);
        self.umount_completed = Some(completed_tx);
        self.unmount_errors = Some(error_tx);
        (completed_rx, error_rx)
    }

    /// Drive mount completions, paired with mount errors.
    pub fn subscribe_mount_events(
        &mut self,
    ) -> (mpsc::Receiver<MountEvent>, mpsc::Receiver<Error>) {
        let (completed_tx, completed_rx) = mpsc::channel(0);
        let (error_tx, error_rx) = mpsc::channel(0);
        self.mount_completed = Some(completed_tx);
        self.mount_errors = Some(error_tx);
        (completed_rx, error_rx)
    }

    /// Filesystem events for freshly reformatted blocks awaiting remount,
    /// paired with format errors.
    pub fn subscribe_format_events(&mut self) -> (mpsc::Receiver<Event>, mpsc::Receiver<Error>) {
        let (completed_tx, completed_rx) = mpsc::channel(0);
        let (error_tx, error_rx) = mpsc::channel(0);
        self.format_completed = Some(completed_tx);
        self.format_errors = Some(error_tx);
        (completed_rx, error_rx)
    }

    /// Arms the signal subscriptions and the job manager, spawns the event
    /// loop and enumerates already-present devices. An enumeration failure
    /// is logged and not fatal: live signals populate the tables lazily.
    pub async fn init(&mut self) -> Result<(), Error> {
        let (dispatcher, streams) = Dispatcher::new(Arc::clone(&self.conn)).await?;
        let EventStreams {
            mut additions,
            mut removals,
            job_additions,
            job_removals,
        } = streams;

        let JobManager {
            format_erase_jobs: _,
            format_mkfs_jobs: mut mkfs_jobs,
            mut mount_jobs,
            mut unmount_jobs,
            task: job_task,
        } = JobManager::new(job_additions, job_removals);

        let mut outward = Outward {
            block_added: self.block_added.clone(),
            block_error: self.block_error.clone(),
            block_device: self.block_device.clone(),
            mount_removed: self.mount_removed.clone(),
            umount_completed: self.umount_completed.clone(),
            mount_completed: self.mount_completed.clone(),
            format_completed: self.format_completed.clone(),
        };
        let policy = PolicyConfig {
            thumb_only: self.thumb_only,
            supported_filesystems: self.supported_filesystems.clone(),
        };
        let state = Arc::clone(&self.state);
        let conn = Arc::clone(&self.conn);

        let loop_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = additions.next() => match event {
                        Some(event) => {
                            let path = event.path.clone();
                            if let Err(err) =
                                process_add_event(&state, &mut outward, &policy, event).await
                            {
                                log::warn!("issues while processing {}: {}", path, err);
                                outward.publish_block_error(err).await;
                            }
                        }
                        None => break,
                    },
                    event = removals.next() => match event {
                        Some(event) => {
                            if let Err(err) =
                                process_remove_event(&state, &mut outward, event).await
                            {
                                log::warn!("issues while processing remove event: {}", err);
                            }
                        }
                        None => break,
                    },
                    job = mkfs_jobs.next() => match job {
                        Some(job) => process_format_mkfs_job(&state, job),
                        None => break,
                    },
                    job = unmount_jobs.next() => match job {
                        Some(job) => process_unmount_job(&state, &mut outward, job).await,
                        None => break,
                    },
                    job = mount_jobs.next() => match job {
                        Some(job) => process_mount_job(&conn, &state, &mut outward, job).await,
                        None => break,
                    },
                }
            }
        });

        self.loop_task = Some(loop_task);
        self.job_task = Some(job_task);
        self.dispatcher = Some(dispatcher);

        if let Some(dispatcher) = &self.dispatcher {
            if let Err(err) = dispatcher.init().await {
                log::warn!("cannot enumerate existing devices: {}", err);
            }
        }
        Ok(())
    }

    /// Mounts the filesystem on `event.path`. Returns immediately; errors
    /// surface on the mount error stream, while the completion surfaces as
    /// a [`MountEvent`] once the corresponding mount job finishes.
    pub fn mount(&self, event: &Event) {
        let conn = Arc::clone(&self.conn);
        let path = event.path.clone();
        let mut errors = self.mount_errors.clone();
        tokio::spawn(async move {
            let proxy = Proxy::new(DEST, path.clone(), METHOD_CALL_TIMEOUT, conn);
            let reply: Result<(String,), dbus::Error> = proxy
                .method_call(FILESYSTEM_IFACE, "Mount", (standard_options(),))
                .await;
            match reply {
                Ok((mountpoint,)) => {
                    log::info!("mount path for {} set to be {}", path, mountpoint);
                }
                Err(err) => send_error(&mut errors, err.into()).await,
            }
        });
    }

    /// Unmounts every block device of a mounted drive. Asking to unmount a
    /// drive that is not mounted reports an error on the unmount error
    /// stream without attempting anything.
    pub async fn unmount(&self, drive: &Drive) {
        if drive.mounted {
            for block_path in drive.block_devices.keys() {
                self.spawn_umount(block_path.clone());
            }
        } else {
            log::info!("drive {} is not mounted", drive.path);
            let mut errors = self.unmount_errors.clone();
            send_error(&mut errors, Error::DriveNotMounted(drive.path.to_string())).await;
        }
    }

    fn spawn_umount(&self, path: dbus::Path<'static>) {
        let conn = Arc::clone(&self.conn);
        let mut errors = self.unmount_errors.clone();
        tokio::spawn(async move {
            log::info!("unmounting {}", path);
            if let Err(err) = sync_umount(&conn, path).await {
                send_error(&mut errors, err.into()).await;
            }
        });
    }

    /// Reformats a drive as vfat: unmounts anything mounted, deletes
    /// existing partitions, then formats the remaining partitionable
    /// blocks. Returns immediately; errors surface on the format error
    /// stream, and the completion surfaces on the format stream once the
    /// reformatted filesystem reappears on the bus.
    pub fn format(&self, drive: &Drive) {
        let mut drive = drive.clone();
        let conn = Arc::clone(&self.conn);
        let state = Arc::clone(&self.state);
        let mut errors = self.format_errors.clone();
        tokio::spawn(async move {
            log::info!("formatting drive {}", drive.path);

            for (path, props) in &drive.block_devices {
                if props_have_mountpoints(props) {
                    if let Err(err) = sync_umount(&conn, path.clone()).await {
                        send_error(&mut errors, err.into()).await;
                        return;
                    }
                }
            }

            let partitions: Vec<dbus::Path<'static>> = drive
                .block_devices
                .iter()
                .filter(|(_, props)| props.contains_key(PARTITION_IFACE))
                .map(|(path, _)| path.clone())
                .collect();
            for path in partitions {
                match partition_delete(&conn, path.clone()).await {
                    Ok(()) => {
                        drive.block_devices.remove(&path);
                        let mut state = state.lock();
                        if let Some(entry) = state.drives.get_mut(&drive.path) {
                            entry.block_devices.remove(&path);
                        }
                    }
                    Err(err) => {
                        send_error(&mut errors, err.into()).await;
                        return;
                    }
                }
            }

            for (path, props) in &drive.block_devices {
                let partitionable = props.contains_key(PARTITION_TABLE_IFACE)
                    || !props.contains_key(PARTITION_IFACE);
                if !partitionable {
                    continue;
                }
                log::info!("formatting {} as {}", path, DEFAULT_FORMAT_FS);
                if let Err(err) = block_format(&conn, path.clone()).await {
                    send_error(&mut errors, err.into()).await;
                }
            }
        });
    }

    /// Cancels the signal subscriptions and stops the event loop.
    pub async fn close(&mut self) {
        if let Some(mut dispatcher) = self.dispatcher.take() {
            dispatcher.close().await;
        }
        if let Some(task) = self.loop_task.take() {
            task.abort();
        }
        if let Some(task) = self.job_task.take() {
            task.abort();
        }
    }
}

impl Drop for StorageWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.loop_task.take() {
            task.abort();
        }
        if let Some(task) = self.job_task.take() {
            task.abort();
        }
    }
}

/// The orchestrator's ends of the outward streams. Publication is skipped
/// for streams nobody subscribed to.
struct Outward {
    block_added: Option<mpsc::Sender<Event>>,
    block_error: Option<mpsc::Sender<Error>>,
    block_device: Option<mpsc::Sender<bool>>,
    mount_removed: Option<mpsc::Sender<String>>,
    umount_completed: Option<mpsc::Sender<String>>,
    mount_completed: Option<mpsc::Sender<MountEvent>>,
    format_completed: Option<mpsc::Sender<Event>>,
}

impl Outward {
    async fn publish_block_added(&mut self, event: Event) {
        if let Some(tx) = self.block_added.as_mut() {
            let _ = tx.send(event).await;
        }
    }

    async fn publish_block_error(&mut self, error: Error) {
        if let Some(tx) = self.block_error.as_mut() {
            let _ = tx.send(error).await;
        }
    }

    async fn publish_block_device(&mut self, present: bool) {
        if let Some(tx) = self.block_device.as_mut() {
            let _ = tx.send(present).await;
        }
    }

    async fn publish_mount_removed(&mut self, mountpoint: String) {
        if let Some(tx) = self.mount_removed.as_mut() {
            let _ = tx.send(mountpoint).await;
        }
    }

    async fn publish_umount_completed(&mut self, path: String) {
        if let Some(tx) = self.umount_completed.as_mut() {
            let _ = tx.send(path).await;
        }
    }

    async fn publish_format_completed(&mut self, event: Event) {
        if let Some(tx) = self.format_completed.as_mut() {
            let _ = tx.send(event).await;
        }
    }
}

struct PolicyConfig {
    thumb_only: bool,
    supported_filesystems: Vec<String>,
}

async fn process_add_event(
    state: &Arc<Mutex<WatcherState>>,
    outward: &mut Outward,
    policy: &PolicyConfig,
    event: Event,
) -> Result<(), Error> {
    let automount = is_automount_enabled();

    let needs_remount;
    let mut accepted = None;
    let mut add_err = None;
    {
        let mut state = state.lock();
        needs_remount = event.is_filesystem() && state.take_pending(&event.path);
        match state.drives.add_interface(&event) {
            Ok(true) => {
                accepted = Some(desired_mountable_event(
                    &event,
                    &state.drives,
                    automount,
                    policy,
                ));
            }
            Ok(false) => {}
            Err(err) => add_err = Some(err),
        }
    }

    if needs_remount {
        log::info!("path {} must be remounted", event.path);
        outward.publish_format_completed(event.clone()).await;
    }

    if let Some(err) = add_err {
        return Err(err);
    }

    if let Some(accepted) = accepted {
        log::info!("new block device added: {}", event.path);
        if accepted {
            outward.publish_block_added(event).await;
        }
        outward.publish_block_device(true).await;
    }
    Ok(())
}

async fn process_remove_event(
    state: &Arc<Mutex<WatcherState>>,
    outward: &mut Outward,
    event: Event,
) -> Result<(), Error> {
    log::info!("remove event for {}", event.path);

    let path_str: &str = &event.path;
    let removed_mountpoint = {
        let mut state = state.lock();
        state.mountpoints.remove(path_str)
    };

    if let Some(mountpoint) = removed_mountpoint {
        log::info!("removing mountpoint {}", mountpoint);
        if event.interfaces.iter().any(|i| i == FILESYSTEM_IFACE) {
            outward.publish_mount_removed(mountpoint).await;
        } else {
            return Err(Error::MountedWithoutFilesystem(event.path.to_string()));
        }
    }

    {
        let mut state = state.lock();
        log::info!("removing device {}", event.path);
        if path_kind(&event.path) == PathKind::Drive {
            state.drives.remove(&event.path);
        }
    }

    outward.publish_block_device(false).await;
    Ok(())
}

fn process_format_mkfs_job(state: &Arc<Mutex<WatcherState>>, job: JobEvent) {
    if !job.was_completed {
        log::info!("format job started");
        return;
    }
    log::info!(
        "format job was finished for {} for paths {:?}",
        job.event.path,
        job.paths
    );
    let mut state = state.lock();
    for path in job.paths {
        state.insert_pending(path);
    }
}

async fn process_unmount_job(
    state: &Arc<Mutex<WatcherState>>,
    outward: &mut Outward,
    job: JobEvent,
) {
    if !job.was_completed {
        log::info!("unmount job started");
        return;
    }
    log::info!(
        "unmount job was finished for {} for paths {:?}",
        job.event.path,
        job.paths
    );
    for path in job.paths {
        outward.publish_umount_completed(path.clone()).await;
        let mut state = state.lock();
        state.mountpoints.remove(&path);
    }
}

async fn process_mount_job(
    conn: &Arc<SyncConnection>,
    state: &Arc<Mutex<WatcherState>>,
    outward: &mut Outward,
    job: JobEvent,
) {
    if !job.was_completed {
        log::info!("mount job started");
        return;
    }
    log::info!(
        "mount job was finished for {} for paths {:?}",
        job.event.path,
        job.paths
    );
    for path in &job.paths {
        let mountpoints = mountpoints_for_path(conn, path).await;
        log::info!("mount points for {} are {:?}", path, mountpoints);
        let mountpoint = match mountpoints.into_iter().next() {
            Some(mountpoint) => mountpoint,
            None => continue,
        };

        let mount_event = {
            let mut state = state.lock();
            state.mountpoints.insert(path.clone(), mountpoint.clone());
            let mut found = None;
            for drive in state.drives.values_mut() {
                if drive.set_mounted(path) {
                    found = Some(MountEvent {
                        path: drive.path.clone(),
                        mountpoint: mountpoint.clone(),
                    });
                    break;
                }
            }
            found
        };

        if let Some(mount_event) = mount_event {
            log::info!("new mount event {:?}", mount_event);
            let mut completed = outward.mount_completed.clone();
            tokio::spawn(async move {
                wait_for_mountpoint(&mount_event.mountpoint).await;
                if let Some(tx) = completed.as_mut() {
                    let _ = tx.send(mount_event).await;
                }
            });
        }
    }
}

/// Waits for the mountpoint directory to show up on disk, giving up after
/// the last delay; callers publish the completion either way.
async fn wait_for_mountpoint(mountpoint: &str) {
    for wait in MOUNTPOINT_WAIT_SECONDS {
        match std::fs::metadata(mountpoint) {
            Ok(_) => break,
            Err(err) => {
                log::info!(
                    "mountpoint {} not yet present, waiting {} seconds: {}",
                    mountpoint,
                    wait,
                    err
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
            }
        }
    }
}

/// Reads `Filesystem.MountPoints` for a block path from the bus. Errors
/// are logged and yield an empty list.
async fn mountpoints_for_path(conn: &Arc<SyncConnection>, path: &str) -> Vec<String> {
    let proxy = Proxy::new(
        DEST,
        dbus::Path::from(path.to_owned()),
        PROPERTY_TIMEOUT,
        Arc::clone(conn),
    );
    let reply: Result<Vec<Vec<u8>>, dbus::Error> =
        proxy.get(FILESYSTEM_IFACE, "MountPoints").await;
    match reply {
        Ok(points) => points.iter().filter_map(|bytes| bytes_to_string(bytes)).collect(),
        Err(err) => {
            log::warn!("error getting mount points for {}: {}", path, err);
            Vec::new()
        }
    }
}

fn standard_options() -> KeyVariant<&'static str> {
    let mut options = KeyVariant::new();
    options.insert("auth.no_user_interaction", Variant(Box::new(true)));
    options
}

async fn sync_umount(
    conn: &Arc<SyncConnection>,
    path: dbus::Path<'static>,
) -> Result<(), dbus::Error> {
    let proxy = Proxy::new(DEST, path, METHOD_CALL_TIMEOUT, Arc::clone(conn));
    let _: () = proxy
        .method_call(FILESYSTEM_IFACE, "Unmount", (standard_options(),))
        .await?;
    Ok(())
}

async fn partition_delete(
    conn: &Arc<SyncConnection>,
    path: dbus::Path<'static>,
) -> Result<(), dbus::Error> {
    let proxy = Proxy::new(DEST, path, METHOD_CALL_TIMEOUT, Arc::clone(conn));
    let _: () = proxy
        .method_call(PARTITION_IFACE, "Delete", (standard_options(),))
        .await?;
    Ok(())
}

async fn block_format(
    conn: &Arc<SyncConnection>,
    path: dbus::Path<'static>,
) -> Result<(), dbus::Error> {
    let proxy = Proxy::new(DEST, path, METHOD_CALL_TIMEOUT, Arc::clone(conn));
    let _: () = proxy
        .method_call(
            BLOCK_IFACE,
            "Format",
            (DEFAULT_FORMAT_FS, standard_options()),
        )
        .await?;
    Ok(())
}

async fn send_error(sender: &mut Option<mpsc::Sender<Error>>, error: Error) {
    if let Some(tx) = sender.as_mut() {
        let _ = tx.send(error).await;
    }
}

fn is_supported_filesystem(supported: &[String], fs: &str) -> bool {
    supported.iter().any(|candidate| candidate == fs)
}

/// Whether the user has opted into automounting by creating the
/// `.automount_enabled` marker under `$SNAP_COMMON`.
fn is_automount_enabled() -> bool {
    let common = std::env::var("SNAP_COMMON").unwrap_or_default();
    std::path::Path::new(&common)
        .join(".automount_enabled")
        .exists()
}

/// The automount policy: decides whether a freshly added block device
/// should be mounted without user interaction. Pure with respect to the
/// event, the drives table and the automount flag.
fn desired_mountable_event(
    event: &Event,
    drives: &DriveMap,
    automount_enabled: bool,
    policy: &PolicyConfig,
) -> bool {
    if !automount_enabled {
        return false;
    }

    if event.is_block_ignored() {
        log::info!(
            "{} will not be automounted as it is marked to be ignored",
            event.path
        );
        return false;
    }

    if !event.has_interface(BLOCK_IFACE) || !event.has_interface(FILESYSTEM_IFACE) {
        log::info!(
            "{} will not be automounted as it is not a block device or does not have a filesystem",
            event.path
        );
        return false;
    }

    if event.is_hint_system() {
        log::info!(
            "{} will not be automounted as it is hinted to be a system device",
            event.path
        );
        return false;
    }

    let drive = match event
        .drive_object_path()
        .ok()
        .and_then(|path| drives.get(&path))
    {
        Some(drive) => drive,
        None => {
            log::info!(
                "{} will not be automounted as we can't find the corresponding drive for it",
                event.path
            );
            return false;
        }
    };

    if drive.has_system_block_devices() {
        log::info!(
            "{} will not be automounted as it's on a system drive",
            event.path
        );
        return false;
    }

    if policy.thumb_only {
        let thumb_compatible = drive
            .media_compatibility()
            .iter()
            .any(|media| media == "thumb");
        if !is_accepted_device(drive.media_removable(), drive.removable(), thumb_compatible) {
            log::info!(
                "{} will not be automounted as its drive is not a removable thumb device",
                event.path
            );
            return false;
        }
    } else if !drive.is_removable() {
        log::info!(
            "{} will not be automounted as its drive is not removable",
            event.path
        );
        return false;
    }

    if event.is_mounted() {
        log::info!(
            "{} will not be automounted as it is already mounted",
            event.path
        );
        return false;
    }

    let id_type = match event.id_type() {
        Some(id_type) => id_type,
        None => {
            log::info!(
                "{} will not be automounted as it has no id type set",
                event.path
            );
            return false;
        }
    };

    if !policy.supported_filesystems.is_empty()
        && !is_supported_filesystem(&policy.supported_filesystems, &id_type)
    {
        log::info!(
            "{} will not be automounted as its filesystem {} is not supported",
            event.path,
            id_type
        );
        return false;
    }

    true
}

/// Strict thumb-drive acceptance: the drive must advertise removability
/// and be compatible with thumb media.
fn is_accepted_device(media_removable: bool, removable: bool, thumb_compatible: bool) -> bool {
    (media_removable || removable) && thumb_compatible
}

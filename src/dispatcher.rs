use std::sync::Arc;
use std::time::Duration;

use dbus::message::SignalArgs;
use dbus::nonblock::stdintf::org_freedesktop_dbus::{
    ObjectManager, ObjectManagerInterfacesAdded, ObjectManagerInterfacesRemoved,
};
use dbus::nonblock::{MsgMatch, Proxy, SyncConnection};
use dbus::strings::BusName;
use futures_channel::mpsc;

use crate::event::Event;
use crate::registry::{path_kind, PathKind};
use crate::utils::fibonacci;
use crate::{Error, InterfacesAndProperties, DEFAULT_MAXIMUM_WAIT_TIME, DEST, JOB_IFACE, PATH};

const ENUMERATE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Subscribes to the ObjectManager add/remove signals of the UDisks2
/// service and decodes them into [`Event`]s.
///
/// Events carrying the `Job` interface are routed to the job streams; all
/// other objects land on `additions`/`removals`.
pub(crate) struct Dispatcher {
    conn: Arc<SyncConnection>,
    additions_tx: mpsc::UnboundedSender<Event>,
    matches: Vec<MsgMatch>,
}

/// The read ends of the dispatcher's four internal streams.
pub(crate) struct EventStreams {
    pub additions: mpsc::UnboundedReceiver<Event>,
    pub removals: mpsc::UnboundedReceiver<Event>,
    pub job_additions: mpsc::UnboundedReceiver<Event>,
    pub job_removals: mpsc::UnboundedReceiver<Event>,
}

impl Dispatcher {
    /// Arms the two signal subscriptions, scoped to the UDisks2 well-known
    /// name and its object-manager root path.
    pub(crate) async fn new(
        conn: Arc<SyncConnection>,
    ) -> Result<(Dispatcher, EventStreams), Error> {
        let (additions_tx, additions) = mpsc::unbounded();
        let (removals_tx, removals) = mpsc::unbounded();
        let (job_additions_tx, job_additions) = mpsc::unbounded();
        let (job_removals_tx, job_removals) = mpsc::unbounded();

        let sender: BusName = DEST.into();
        let root: dbus::Path = PATH.into();

        let added_rule =
            ObjectManagerInterfacesAdded::match_rule(Some(&sender), Some(&root)).static_clone();
        let added_tx = additions_tx.clone();
        let added_match = conn.add_match(added_rule).await?.msg_cb(move |msg| {
            if let Some(ObjectManagerInterfacesAdded { object, interfaces }) =
                ObjectManagerInterfacesAdded::from_message(&msg)
            {
                let event = Event::added(object, interfaces);
                let target = if event.has_interface(JOB_IFACE) {
                    &job_additions_tx
                } else {
                    &added_tx
                };
                let _ = target.unbounded_send(event);
            }
            true
        });

        let removed_rule =
            ObjectManagerInterfacesRemoved::match_rule(Some(&sender), Some(&root)).static_clone();
        let removed_match = conn.add_match(removed_rule).await?.msg_cb(move |msg| {
            if let Some(ObjectManagerInterfacesRemoved { object, interfaces }) =
                ObjectManagerInterfacesRemoved::from_message(&msg)
            {
                let event = Event::removed(object, interfaces);
                let target = if event.interfaces.iter().any(|i| i == JOB_IFACE) {
                    &job_removals_tx
                } else {
                    &removals_tx
                };
                let _ = target.unbounded_send(event);
            }
            true
        });

        let dispatcher = Dispatcher {
            conn,
            additions_tx,
            matches: vec![added_match, removed_match],
        };
        let streams = EventStreams {
            additions,
            removals,
            job_additions,
            job_removals,
        };
        Ok((dispatcher, streams))
    }

    /// Enumerates the objects already managed by the service and delivers
    /// them as addition events, drives before blocks, so that child blocks
    /// find their parent drive already registered.
    ///
    /// On some systems the `org.freedesktop.UDisks2` name is registered
    /// before the ObjectManager interface is ready and `GetManagedObjects`
    /// fails; the call is retried with Fibonacci delays until the delay
    /// bound is reached.
    pub(crate) async fn init(&self) -> Result<(), Error> {
        let proxy = Proxy::new(DEST, PATH, ENUMERATE_TIMEOUT, self.conn.clone());

        let mut fib = fibonacci();
        let mut last_err = None;
        let mut managed = None;
        let mut wait = fib();
        while wait < DEFAULT_MAXIMUM_WAIT_TIME {
            match proxy.get_managed_objects().await {
                Ok(objects) => {
                    managed = Some(objects);
                    break;
                }
                Err(err) => {
                    log::warn!("cannot get initial state for devices: {}", err);
                    last_err = Some(err);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    wait = fib();
                }
            }
        }

        let managed = match managed {
            Some(managed) => managed,
            None => return Err(last_err.map(Error::DBus).unwrap_or(Error::BootstrapTimeout)),
        };

        let (drives, blocks) = partition_managed_objects(managed);
        for event in drives.into_iter().chain(blocks) {
            let _ = self.additions_tx.unbounded_send(event);
        }
        Ok(())
    }

    /// Cancels the signal subscriptions.
    pub(crate) async fn close(&mut self) {
        for m in self.matches.drain(..) {
            let _ = self.conn.remove_match(m.token()).await;
        }
    }
}

/// Splits an enumeration snapshot into drive and block addition events,
/// ignoring paths that are neither.
pub(crate) fn partition_managed_objects(
    objects: std::collections::HashMap<dbus::Path<'static>, InterfacesAndProperties>,
) -> (Vec<Event>, Vec<Event>) {
    let mut drives = Vec::new();
    let mut blocks = Vec::new();
    for (path, props) in objects {
        match path_kind(&path) {
            PathKind::Drive => drives.push(Event::added(path, props)),
            PathKind::Block => blocks.push(Event::added(path, props)),
            PathKind::Unhandled => log::trace!("ignoring managed object {}", path),
        }
    }
    (drives, blocks)
}

//! Integration tests exercising full daemon sessions on loopback.

use std::sync::Arc;
use std::time::Duration;

use edgelink_clipboard::mock::MockClipboard;
use edgelink_daemon::{
    Backends, Config, DaemonError, DaemonStatus, RunningDaemon, SessionEnd, SessionPhase,
};
use edgelink_input::mock::{
    Injected, MockCapture, MockInput, MockInputHandle, MockOverlay, MockOverlayHandle,
};
use edgelink_protocol::{connect, ConnectOptions, ProtocolError};
use edgelink_types::{
    Channel, ClipboardPayload, ControlMessage, Edge, InputEvent, KeyToken, LocalInput, Message,
    MouseButton, NamedKey, Role, ScreenGeometry,
};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

const WIDTH: i32 = 1920;
const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Two ports nothing is listening on.
fn free_ports() -> (u16, u16) {
    let a = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let b = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    (
        a.local_addr().unwrap().port(),
        b.local_addr().unwrap().port(),
    )
}

fn server_config(ports: (u16, u16)) -> Config {
    let mut config = Config::for_session(Role::Server, None, Edge::Right, "control+alt+s");
    config.session.bind = "127.0.0.1".to_string();
    config.session.primary_port = ports.0;
    config.session.secondary_port = ports.1;
    config.session.read_timeout_ms = 100;
    config.edge.poll_interval_ms = 5;
    config.clipboard.poll_interval_ms = 20;
    config
}

fn client_config(ports: (u16, u16)) -> Config {
    let mut config = Config::for_session(Role::Client, Some("127.0.0.1"), Edge::Right, "");
    config.session.primary_port = ports.0;
    config.session.secondary_port = ports.1;
    config.session.connect_timeout_ms = 1000;
    config.session.connect_retries = 10;
    config.session.retry_interval_ms = 1000;
    config.session.read_timeout_ms = 100;
    config.clipboard.poll_interval_ms = 20;
    config
}

/// One daemon plus the mock backends it drives.
#[allow(dead_code)]
struct Peer {
    daemon: RunningDaemon,
    feed: mpsc::Sender<LocalInput>,
    input: MockInputHandle,
    overlay: MockOverlayHandle,
    clipboard: MockClipboard,
    status: watch::Receiver<DaemonStatus>,
}

impl Peer {
    fn spawn(config: Config) -> Self {
        let (capture, feed) = MockCapture::new();
        let input = MockInput::new(ScreenGeometry::new(1920, 1080));
        let input_handle = input.handle();
        let overlay = MockOverlay::new();
        let overlay_handle = overlay.handle();
        let clipboard = MockClipboard::new();
        let backends = Backends {
            capture: Box::new(capture),
            input: Arc::new(input),
            clipboard: Arc::new(clipboard.clone()),
            overlay: Arc::new(overlay),
        };
        let daemon = edgelink_daemon::start(config, backends).unwrap();
        let status = daemon.handle().subscribe();
        Self {
            daemon,
            feed,
            input: input_handle,
            overlay: overlay_handle,
            clipboard,
            status,
        }
    }

    fn is_active(&self) -> bool {
        self.daemon.handle().is_active()
    }

    async fn key(&self, key: KeyToken, pressed: bool) {
        self.feed.send(LocalInput::Key { key, pressed }).await.unwrap();
    }
}

/// A live server/client pair. The client holds control at the start.
struct TestPair {
    server: Peer,
    client: Peer,
}

impl TestPair {
    async fn shutdown(self) {
        let _ = tokio::time::timeout(TIMEOUT, self.client.daemon.stop()).await;
        let _ = tokio::time::timeout(TIMEOUT, self.server.daemon.stop()).await;
    }

    /// Push the server pointer over the right edge and wait for the handoff.
    async fn hand_to_client(&self) {
        self.server.input.move_pointer(WIDTH - 1, 540);
        wait_until("server active", || self.server.is_active()).await;
        wait_until("client inactive", || !self.client.is_active()).await;
    }
}

async fn setup_pair() -> TestPair {
    init_tracing();
    let ports = free_ports();
    let mut server = Peer::spawn(server_config(ports));
    let mut client = Peer::spawn(client_config(ports));

    wait_for_status(&mut server.status, |s| s.phase == SessionPhase::Live)
        .await
        .expect("server should go live");
    wait_for_status(&mut client.status, |s| s.phase == SessionPhase::Live)
        .await
        .expect("client should go live");

    let pair = TestPair { server, client };
    wait_until("client starts in control", || pair.client.is_active()).await;
    pair
}

/// Wait for a condition on a status receiver with timeout.
async fn wait_for_status(
    rx: &mut watch::Receiver<DaemonStatus>,
    pred: impl Fn(&DaemonStatus) -> bool,
) -> Result<DaemonStatus, &'static str> {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            {
                let status = rx.borrow_and_update().clone();
                if pred(&status) {
                    return Ok(status);
                }
            }
            if rx.changed().await.is_err() {
                return Err("watch closed");
            }
        }
    })
    .await
    .map_err(|_| "timeout")?
}

/// Poll a condition until it holds, panicking after the timeout.
async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_session_start_gives_client_control() {
    let pair = setup_pair().await;

    assert!(pair.client.is_active());
    assert!(!pair.server.is_active());
    assert!(!pair.server.overlay.is_visible());
    let status = pair.server.daemon.handle().status();
    assert_eq!(status.role, Role::Server);
    assert_eq!(status.sessions, 1);
    assert!(status.peer.is_some());

    pair.shutdown().await;
}

#[tokio::test]
async fn test_right_edge_handoff() {
    let pair = setup_pair().await;
    pair.hand_to_client().await;

    // Local pointer jumps to the left margin, overlay goes up.
    assert_eq!(pair.server.input.pointer(), (2, 540));
    assert!(pair.server.overlay.is_visible());

    // The client's pointer enters at its left edge, same height.
    wait_until("client pointer placed", || {
        pair.client.input.injected().iter().any(|i| {
            matches!(i, Injected::PointerSet { x, y } if *x <= 3 && (*y - 540).abs() <= 1)
        })
    })
    .await;

    // Stepping back over the left edge returns control once cooldown clears.
    pair.server.input.move_pointer(500, 540);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(pair.server.is_active());
    pair.server.input.move_pointer(0, 540);
    wait_until("server inactive", || !pair.server.is_active()).await;
    wait_until("client active again", || pair.client.is_active()).await;
    assert_eq!(pair.server.input.pointer(), (WIDTH - 2, 540));
    assert!(!pair.server.overlay.is_visible());

    pair.shutdown().await;
}

#[tokio::test]
async fn test_input_forwarded_only_while_active() {
    let pair = setup_pair().await;

    // Not in control yet: nothing reaches the client.
    pair.server.key(KeyToken::Char('x'), true).await;
    pair.server.key(KeyToken::Char('x'), false).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pair
        .client
        .input
        .injected()
        .iter()
        .any(|i| matches!(i, Injected::KeyPressed(_))));

    pair.hand_to_client().await;

    let samples = [
        LocalInput::PointerMoved { x: 960, y: 270 },
        LocalInput::Button {
            button: MouseButton::Left,
            pressed: true,
        },
        LocalInput::Button {
            button: MouseButton::Left,
            pressed: false,
        },
        LocalInput::Scroll { dx: 0, dy: -2 },
        LocalInput::Key {
            key: KeyToken::Char('a'),
            pressed: true,
        },
        LocalInput::Key {
            key: KeyToken::Char('a'),
            pressed: false,
        },
    ];
    for sample in samples {
        pair.server.feed.send(sample).await.unwrap();
    }

    wait_until("key release applied", || {
        pair.client
            .input
            .injected()
            .contains(&Injected::KeyReleased(KeyToken::Char('a')))
    })
    .await;
    let injected = pair.client.input.injected();
    assert!(injected.contains(&Injected::ButtonPressed(MouseButton::Left)));
    assert!(injected.contains(&Injected::ButtonReleased(MouseButton::Left)));
    assert!(injected.contains(&Injected::Scroll { dx: 0, dy: -2 }));
    assert!(injected.contains(&Injected::KeyPressed(KeyToken::Char('a'))));
    assert!(!injected.contains(&Injected::KeyPressed(KeyToken::Char('x'))));
    let (x, y) = pair.client.input.pointer();
    assert!((x - 960).abs() <= 1 && (y - 270).abs() <= 1, "pointer at {x},{y}");

    pair.shutdown().await;
}

#[tokio::test]
async fn test_hotkey_toggle_off_returns_control() {
    let pair = setup_pair().await;
    pair.hand_to_client().await;

    pair.server.key(KeyToken::Named(NamedKey::CtrlL), true).await;
    pair.server.key(KeyToken::Named(NamedKey::AltL), true).await;
    pair.server.key(KeyToken::Char('s'), true).await;

    wait_until("server inactive", || !pair.server.is_active()).await;
    wait_until("client active", || pair.client.is_active()).await;
    assert!(!pair.server.daemon.handle().is_sharing_enabled());
    assert!(!pair.server.overlay.is_visible());

    // Modifiers pressed while forwarding are released on the client too.
    // The key that fired the hotkey never reaches it.
    pair.server.key(KeyToken::Char('s'), false).await;
    pair.server.key(KeyToken::Named(NamedKey::AltL), false).await;
    pair.server.key(KeyToken::Named(NamedKey::CtrlL), false).await;
    wait_until("modifiers released remotely", || {
        let injected = pair.client.input.injected();
        injected.contains(&Injected::KeyReleased(KeyToken::Named(NamedKey::AltL)))
            && injected.contains(&Injected::KeyReleased(KeyToken::Named(NamedKey::CtrlL)))
    })
    .await;
    let injected = pair.client.input.injected();
    assert!(!injected.contains(&Injected::KeyPressed(KeyToken::Char('s'))));
    assert!(!injected.contains(&Injected::KeyReleased(KeyToken::Char('s'))));

    // With sharing off the edge no longer hands over.
    pair.server.input.move_pointer(900, 500);
    tokio::time::sleep(Duration::from_millis(50)).await;
    pair.server.input.move_pointer(WIDTH - 1, 500);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pair.server.is_active());
    assert!(pair.client.is_active());

    pair.shutdown().await;
}

#[tokio::test]
async fn test_clipboard_sync_without_echo() {
    let pair = setup_pair().await;

    pair.server
        .clipboard
        .set(ClipboardPayload::text("copied on server"));
    wait_until("client clipboard updated", || {
        pair.client.clipboard.get() == Some(ClipboardPayload::text("copied on server"))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(pair.client.clipboard.write_count(), 1);
    assert_eq!(pair.server.clipboard.write_count(), 0);

    pair.client
        .clipboard
        .set(ClipboardPayload::text("copied on client"));
    wait_until("server clipboard updated", || {
        pair.server.clipboard.get() == Some(ClipboardPayload::text("copied on client"))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(pair.server.clipboard.write_count(), 1);
    assert_eq!(pair.client.clipboard.write_count(), 1);

    pair.shutdown().await;
}

#[tokio::test]
async fn test_link_loss_tears_down_session() {
    let TestPair { mut server, client } = setup_pair().await;
    server.input.move_pointer(WIDTH - 1, 540);
    wait_until("server active", || server.is_active()).await;

    assert_eq!(client.daemon.stop().await.unwrap(), SessionEnd::Stopped);

    let end = tokio::time::timeout(TIMEOUT, server.daemon.wait())
        .await
        .expect("server session should end")
        .unwrap();
    assert!(matches!(end, SessionEnd::LinkLost(_)), "{end:?}");
    let status = wait_for_status(&mut server.status, |s| s.phase == SessionPhase::Ended)
        .await
        .unwrap();
    assert_eq!(status.sessions, 1);
    assert!(!server.overlay.is_visible());
}

#[tokio::test]
async fn test_peer_claim_over_raw_link() {
    init_tracing();
    let ports = free_ports();
    let mut config = server_config(ports);
    config.clipboard.enabled = false;
    let server = Peer::spawn(config);

    let options = ConnectOptions {
        timeout: Duration::from_secs(1),
        retries: 100,
        interval: Duration::from_millis(20),
    };
    let primary = connect(&format!("127.0.0.1:{}", ports.0), Channel::Primary, options)
        .await
        .unwrap();
    let secondary = connect(&format!("127.0.0.1:{}", ports.1), Channel::Secondary, options)
        .await
        .unwrap();
    let (_primary_tx, mut primary_rx) = primary.into_split();
    let (mut secondary_tx, mut secondary_rx) = secondary.into_split();

    let recv = |msg: Option<Message>| msg.expect("message");
    let first = tokio::time::timeout(TIMEOUT, secondary_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        recv(first),
        Message::Control(ControlMessage::ActiveDeviceChanged(false))
    );

    server.input.move_pointer(WIDTH - 1, 100);
    let claim = tokio::time::timeout(TIMEOUT, secondary_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        recv(claim),
        Message::Control(ControlMessage::ActiveDeviceChanged(true))
    );
    let entry = tokio::time::timeout(TIMEOUT, primary_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(recv(entry), Message::Input(InputEvent::Move(p)) if p.x < 0.01));

    // The peer insists it is in control: the server yields silently.
    secondary_tx
        .send(&Message::Control(ControlMessage::ActiveDeviceChanged(true)))
        .await
        .unwrap();
    wait_until("server stands down", || !server.is_active()).await;
    assert!(!server.overlay.is_visible());
    assert!(
        tokio::time::timeout(Duration::from_millis(200), secondary_rx.recv())
            .await
            .is_err(),
        "no reply expected"
    );

    let end = server.daemon.stop().await.unwrap();
    assert_eq!(end, SessionEnd::Stopped);
}

#[tokio::test]
async fn test_client_gives_up_without_server() {
    init_tracing();
    let mut config = client_config(free_ports());
    config.session.connect_retries = 2;
    config.session.connect_timeout_ms = 200;
    let mut client = Peer::spawn(config);

    let result = tokio::time::timeout(TIMEOUT, client.daemon.wait())
        .await
        .expect("client should give up");
    assert!(matches!(
        result,
        Err(DaemonError::Protocol(ProtocolError::Connect { attempts: 2, .. }))
    ));
    assert_eq!(client.status.borrow_and_update().phase, SessionPhase::Ended);
}

#[tokio::test]
async fn test_stop_while_waiting_for_peer() {
    init_tracing();
    let mut server = Peer::spawn(server_config(free_ports()));
    let handle = server.daemon.handle().clone();
    wait_for_status(&mut server.status, |s| s.phase == SessionPhase::Connecting)
        .await
        .unwrap();

    let end = tokio::time::timeout(TIMEOUT, server.daemon.stop())
        .await
        .expect("stop should not hang")
        .unwrap();
    assert_eq!(end, SessionEnd::Stopped);
    assert!(!handle.is_active());
    assert_eq!(handle.status().phase, SessionPhase::Ended);
}

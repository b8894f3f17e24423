//! Conversion between local input samples and wire events.
//!
//! Pointer positions are normalised with the sender's screen on the way out
//! and mapped onto the receiver's screen on the way in.

use edgelink_types::{InputEvent, LocalInput, NormalizedPointer, ScreenGeometry};
use tracing::trace;

use crate::error::InputError;
use crate::InputBackend;

/// Convert a local sample into the event sent to the peer.
#[must_use]
pub fn encode(input: &LocalInput, screen: &ScreenGeometry) -> InputEvent {
    match input {
        LocalInput::PointerMoved { x, y } => {
            InputEvent::Move(NormalizedPointer::from_pixels(*x, *y, screen))
        }
        LocalInput::Button { button, pressed } => InputEvent::Click {
            button: *button,
            pressed: *pressed,
        },
        LocalInput::Scroll { dx, dy } => InputEvent::Scroll { dx: *dx, dy: *dy },
        LocalInput::Key { key, pressed: true } => InputEvent::KeyPress(key.clone()),
        LocalInput::Key { key, pressed: false } => InputEvent::KeyRelease(key.clone()),
    }
}

/// Apply an event received from the peer to the local machine.
pub async fn apply(backend: &dyn InputBackend, event: &InputEvent) -> Result<(), InputError> {
    match event {
        InputEvent::Move(pointer) => {
            let screen = backend.screen().await?;
            let (x, y) = pointer.to_pixels(&screen);
            trace!(x, y, "moving pointer");
            backend.set_pointer_position(x, y).await
        }
        InputEvent::Click {
            button,
            pressed: true,
        } => backend.press_button(*button).await,
        InputEvent::Click {
            button,
            pressed: false,
        } => backend.release_button(*button).await,
        InputEvent::Scroll { dx, dy } => backend.scroll(*dx, *dy).await,
        InputEvent::KeyPress(key) => backend.press_key(key).await,
        InputEvent::KeyRelease(key) => backend.release_key(key).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Injected, MockInput};
    use edgelink_types::{KeyToken, MouseButton, NamedKey};

    #[test]
    fn encode_normalises_with_local_screen() {
        let screen = ScreenGeometry::new(2000, 1000);
        let event = encode(&LocalInput::PointerMoved { x: 500, y: 250 }, &screen);
        assert_eq!(event, InputEvent::Move(NormalizedPointer::new(0.25, 0.25)));
    }

    #[test]
    fn encode_keys_and_buttons() {
        let screen = ScreenGeometry::new(800, 600);
        let key = KeyToken::Named(NamedKey::Enter);
        assert_eq!(
            encode(
                &LocalInput::Key {
                    key: key.clone(),
                    pressed: true
                },
                &screen
            ),
            InputEvent::KeyPress(key.clone())
        );
        assert_eq!(
            encode(
                &LocalInput::Key {
                    key: key.clone(),
                    pressed: false
                },
                &screen
            ),
            InputEvent::KeyRelease(key)
        );
        assert_eq!(
            encode(
                &LocalInput::Button {
                    button: MouseButton::Right,
                    pressed: true
                },
                &screen
            ),
            InputEvent::Click {
                button: MouseButton::Right,
                pressed: true
            }
        );
    }

    #[tokio::test]
    async fn apply_uses_receiver_screen() {
        let input = MockInput::new(ScreenGeometry::new(1280, 720));
        let handle = input.handle();

        apply(&input, &InputEvent::Move(NormalizedPointer::new(0.5, 1.0)))
            .await
            .unwrap();
        assert_eq!(handle.pointer(), (640, 719));

        apply(&input, &InputEvent::Scroll { dx: 0, dy: -2 }).await.unwrap();
        apply(
            &input,
            &InputEvent::Click {
                button: MouseButton::Left,
                pressed: false,
            },
        )
        .await
        .unwrap();
        apply(&input, &InputEvent::KeyPress(KeyToken::Char('k')))
            .await
            .unwrap();

        assert_eq!(
            handle.injected(),
            vec![
                Injected::PointerSet { x: 640, y: 719 },
                Injected::Scroll { dx: 0, dy: -2 },
                Injected::ButtonReleased(MouseButton::Left),
                Injected::KeyPressed(KeyToken::Char('k')),
            ]
        );
    }

    #[tokio::test]
    async fn apply_propagates_backend_failure() {
        let input = MockInput::new(ScreenGeometry::new(100, 100));
        input.handle().set_failing(true);
        let result = apply(&input, &InputEvent::KeyPress(KeyToken::Char('x'))).await;
        assert!(matches!(result, Err(InputError::Inject(_))));
    }
}

// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages sent to the
// app orchestrator, or into local ViewState mutations (composer editing,
// scrolling, the credential form, quit confirmation).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use vextchat_core::protocol::{RelayStatus, UserCommand};

use super::{CredentialForm, ViewState};

/// Lines moved by PageUp/PageDown.
const PAGE_SIZE: usize = 10;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app orchestrator (SendMessage, SetCredentials, Quit). Returns `None` when
/// the key press was handled locally by mutating `ViewState`.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Only process key press events. On Windows, crossterm emits both
    // Press and Release events for each physical keypress.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C always quits immediately regardless of mode
    if ctrl && key_event.code == KeyCode::Char('c') {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    if view_state.credential_form.is_some() {
        return handle_credential_form(key_event, view_state);
    }

    handle_compose(key_event, ctrl, view_state)
}

/// Compose mode: the default. Printable keys edit the message.
fn handle_compose(key_event: KeyEvent, ctrl: bool, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('q') if ctrl => {
            view_state.confirm_quit = true;
            None
        }
        KeyCode::Char('k') if ctrl => {
            open_credential_form(view_state);
            None
        }
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(c) => {
            view_state.composer.push(c);
            None
        }
        KeyCode::Backspace => {
            view_state.composer.pop();
            None
        }
        KeyCode::Enter => submit_message(view_state),
        KeyCode::Esc => {
            view_state.confirm_quit = true;
            None
        }

        // Scrolling (transcript)
        KeyCode::Up => {
            scroll_up(view_state, 1);
            None
        }
        KeyCode::Down => {
            scroll_down(view_state, 1);
            None
        }
        KeyCode::PageUp => {
            scroll_up(view_state, PAGE_SIZE);
            None
        }
        KeyCode::PageDown => {
            scroll_down(view_state, PAGE_SIZE);
            None
        }

        _ => None,
    }
}

/// Take the composer text as a message. Blank text and sends while a reply
/// is pending keep the composer untouched.
///
/// The view goes pending as soon as a message leaves, ahead of the app's
/// status echo.
fn submit_message(view_state: &mut ViewState) -> Option<UserCommand> {
    if view_state.composer.trim().is_empty() {
        return None;
    }
    if view_state.is_pending() {
        view_state.notice = Some("Wait for the current reply before sending.".to_string());
        return None;
    }
    view_state.notice = None;
    view_state.relay_status = RelayStatus::Pending;
    let text = std::mem::take(&mut view_state.composer);
    Some(UserCommand::SendMessage(text))
}

fn open_credential_form(view_state: &mut ViewState) {
    if view_state.credentials_editable() {
        view_state.credential_form = Some(CredentialForm::default());
    } else {
        view_state.notice = Some("Credentials come from the secret store.".to_string());
    }
}

/// Handle key events while the credential form is open.
///
/// - Tab/Down and BackTab/Up move between fields
/// - Enter submits all three fields
/// - Esc discards the form
fn handle_credential_form(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let form = view_state.credential_form.as_mut()?;
    match key_event.code {
        KeyCode::Tab | KeyCode::Down => {
            form.next_field();
            None
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.prev_field();
            None
        }
        KeyCode::Backspace => {
            form.focused_value_mut().pop();
            None
        }
        KeyCode::Char(_) if key_event.modifiers.contains(KeyModifiers::CONTROL) => None,
        KeyCode::Char(c) => {
            form.focused_value_mut().push(c);
            None
        }
        KeyCode::Enter => {
            let bundle = form.to_bundle();
            view_state.credential_form = None;
            Some(UserCommand::SetCredentials(bundle))
        }
        KeyCode::Esc => {
            view_state.credential_form = None;
            None
        }
        _ => None,
    }
}

/// Handle key events while in quit confirmation mode.
///
/// - `y` or `q` confirms quit (sends UserCommand::Quit)
/// - `n` or `Esc` cancels (returns to compose mode)
/// - All other keys are blocked (no-op)
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None, // Block all other input
    }
}

fn scroll_up(view_state: &mut ViewState, lines: usize) {
    view_state.scroll_offset = view_state.scroll_offset.saturating_add(lines);
}

fn scroll_down(view_state: &mut ViewState, lines: usize) {
    view_state.scroll_offset = view_state.scroll_offset.saturating_sub(lines);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use vextchat_core::credentials::{CredentialBundle, CredentialSource};

    use crate::tui::tests::snapshot;
    use crate::tui::FormField;

    /// Helper to create a KeyEvent with no modifiers.
    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    /// Helper to create a KeyEvent with Ctrl modifier.
    fn ctrl_key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(state: &mut ViewState, text: &str) {
        for c in text.chars() {
            assert!(handle_key(key(KeyCode::Char(c)), state).is_none());
        }
    }

    fn interactive_state() -> ViewState {
        let mut state = ViewState::default();
        state.apply_snapshot(snapshot(CredentialSource::Interactive, false));
        state
    }

    // -- Composer --

    #[test]
    fn typing_fills_composer() {
        let mut state = ViewState::default();
        type_text(&mut state, "hi q");
        assert_eq!(state.composer, "hi q");
        assert!(!state.confirm_quit);
    }

    #[test]
    fn backspace_removes_last_char() {
        let mut state = ViewState::default();
        type_text(&mut state, "ab");
        handle_key(key(KeyCode::Backspace), &mut state);
        assert_eq!(state.composer, "a");
        handle_key(key(KeyCode::Backspace), &mut state);
        handle_key(key(KeyCode::Backspace), &mut state);
        assert!(state.composer.is_empty());
    }

    #[test]
    fn enter_sends_and_clears_composer() {
        let mut state = ViewState::default();
        state.notice = Some("old".into());
        type_text(&mut state, "hello");
        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(cmd, Some(UserCommand::SendMessage("hello".into())));
        assert!(state.composer.is_empty());
        assert!(state.notice.is_none());
    }

    #[test]
    fn second_enter_before_status_echo_keeps_text() {
        let mut state = ViewState::default();
        type_text(&mut state, "first");
        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::SendMessage("first".into()))
        );
        assert!(state.is_pending());

        type_text(&mut state, "second");
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert_eq!(state.composer, "second");
        assert!(state.notice.is_some());
    }

    #[test]
    fn enter_on_blank_composer_does_nothing() {
        let mut state = ViewState::default();
        type_text(&mut state, "   ");
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert_eq!(state.composer, "   ");
    }

    #[test]
    fn enter_while_pending_keeps_text() {
        let mut state = ViewState::default();
        state.relay_status = RelayStatus::Pending;
        type_text(&mut state, "next");
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert_eq!(state.composer, "next");
        assert!(state.notice.is_some());
    }

    #[test]
    fn ctrl_chars_are_not_typed() {
        let mut state = ViewState::default();
        handle_key(ctrl_key(KeyCode::Char('x')), &mut state);
        assert!(state.composer.is_empty());
    }

    // -- Scroll --

    #[test]
    fn up_and_page_up_scroll_back() {
        let mut state = ViewState::default();
        handle_key(key(KeyCode::Up), &mut state);
        assert_eq!(state.scroll_offset, 1);
        handle_key(key(KeyCode::PageUp), &mut state);
        assert_eq!(state.scroll_offset, 1 + PAGE_SIZE);
    }

    #[test]
    fn scroll_down_does_not_underflow() {
        let mut state = ViewState::default();
        state.scroll_offset = 3;
        handle_key(key(KeyCode::PageDown), &mut state);
        assert_eq!(state.scroll_offset, 0);
        handle_key(key(KeyCode::Down), &mut state);
        assert_eq!(state.scroll_offset, 0);
    }

    // -- Credential form --

    #[test]
    fn ctrl_k_opens_form_for_interactive_source() {
        let mut state = interactive_state();
        handle_key(ctrl_key(KeyCode::Char('k')), &mut state);
        assert!(state.credential_form.is_some());
    }

    #[test]
    fn ctrl_k_refused_for_secret_store() {
        let mut state = ViewState::default();
        state.apply_snapshot(snapshot(CredentialSource::SecretStore, true));
        handle_key(ctrl_key(KeyCode::Char('k')), &mut state);
        assert!(state.credential_form.is_none());
        assert!(state.notice.is_some());
    }

    #[test]
    fn form_collects_fields_and_submits() {
        let mut state = interactive_state();
        handle_key(ctrl_key(KeyCode::Char('k')), &mut state);

        type_text(&mut state, "key");
        handle_key(key(KeyCode::Tab), &mut state);
        type_text(&mut state, "chan");
        handle_key(key(KeyCode::Down), &mut state);
        type_text(&mut state, "ep");
        assert_eq!(
            state.credential_form.as_ref().unwrap().focused(),
            FormField::EndpointId
        );
        assert!(state.composer.is_empty());

        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(
            cmd,
            Some(UserCommand::SetCredentials(CredentialBundle::new("key", "chan", "ep")))
        );
        assert!(state.credential_form.is_none());
    }

    #[test]
    fn form_backtab_and_backspace_edit_previous_field() {
        let mut state = interactive_state();
        handle_key(ctrl_key(KeyCode::Char('k')), &mut state);
        type_text(&mut state, "ab");
        handle_key(key(KeyCode::Tab), &mut state);
        handle_key(key(KeyCode::BackTab), &mut state);
        handle_key(key(KeyCode::Backspace), &mut state);
        assert_eq!(state.credential_form.as_ref().unwrap().api_key, "a");
    }

    #[test]
    fn form_esc_discards() {
        let mut state = interactive_state();
        handle_key(ctrl_key(KeyCode::Char('k')), &mut state);
        type_text(&mut state, "secret");
        assert!(handle_key(key(KeyCode::Esc), &mut state).is_none());
        assert!(state.credential_form.is_none());
        assert!(!state.confirm_quit);
    }

    // -- Quit confirmation --

    #[test]
    fn esc_enters_confirm_quit_mode() {
        let mut state = ViewState::default();
        assert!(handle_key(key(KeyCode::Esc), &mut state).is_none());
        assert!(state.confirm_quit);
    }

    #[test]
    fn ctrl_q_enters_confirm_quit_mode() {
        let mut state = ViewState::default();
        assert!(handle_key(ctrl_key(KeyCode::Char('q')), &mut state).is_none());
        assert!(state.confirm_quit);
    }

    #[test]
    fn confirm_quit_y_and_q_send_quit() {
        for c in ['y', 'Y', 'q', 'Q'] {
            let mut state = ViewState::default();
            state.confirm_quit = true;
            assert_eq!(
                handle_key(key(KeyCode::Char(c)), &mut state),
                Some(UserCommand::Quit)
            );
        }
    }

    #[test]
    fn confirm_quit_n_and_esc_cancel() {
        for code in [KeyCode::Char('n'), KeyCode::Char('N'), KeyCode::Esc] {
            let mut state = ViewState::default();
            state.confirm_quit = true;
            assert!(handle_key(key(code), &mut state).is_none());
            assert!(!state.confirm_quit);
        }
    }

    #[test]
    fn confirm_quit_blocks_other_keys() {
        let mut state = ViewState::default();
        state.confirm_quit = true;
        for code in [KeyCode::Char('a'), KeyCode::Enter, KeyCode::Up, KeyCode::Backspace] {
            assert!(handle_key(key(code), &mut state).is_none());
        }
        assert!(state.composer.is_empty());
        assert!(state.confirm_quit);
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let mut state = interactive_state();
        assert_eq!(
            handle_key(ctrl_key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::Quit)
        );

        state.credential_form = Some(CredentialForm::default());
        assert_eq!(
            handle_key(ctrl_key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::Quit)
        );

        state.confirm_quit = true;
        assert_eq!(
            handle_key(ctrl_key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn release_events_are_ignored() {
        let mut state = ViewState::default();
        let release = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert!(handle_key(release, &mut state).is_none());
        assert!(state.composer.is_empty());
    }
}

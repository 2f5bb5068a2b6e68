//! Drive a navigation stack from the keyboard.
//!
//! The terminal plays the rendering engine: every key press ends with one
//! layout pass over the stack's container view.
//!
//! Keys: `p` push a screen, `b`/Backspace back, `h` hide/show the stack, `q` quit.
//! Set `ROOM_NAV_LOG` to a path to also write JSON logs there.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use room_nav::{
    FileSink, LifecycleLoggerListener, LifecycleListener, Logger, NavigationAudit,
    NavigationAuditEvent, NavigationConfig, OwnerContext, Result, StackController, ViewController,
    Visibility, emit_metrics_snapshot,
};

struct PrintAudit;

impl NavigationAudit for PrintAudit {
    fn record(&self, event: NavigationAuditEvent) {
        let details = event
            .details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        print!("[AUDIT] {:?} {} {details}\r\n", event.stage, event.controller);
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut config = NavigationConfig::default().with_audit(Arc::new(PrintAudit));
    config.enable_metrics();
    if let Ok(path) = std::env::var("ROOM_NAV_LOG") {
        config = config.with_logger(file_logger(&path)?);
    }
    let context = OwnerContext::with_config("terminal", config);
    let stack = StackController::new(&context, "main");
    let mut listeners: Vec<Arc<dyn LifecycleListener>> = Vec::new();

    push_screen(&context, &stack, &mut listeners, 0)?;
    stack.view().dispatch_layout();

    enable_raw_mode()?;
    let outcome = run(&context, &stack, &mut listeners);
    disable_raw_mode()?;
    outcome?;

    emit_metrics_snapshot(&context, "room_nav::demo.metrics");
    Ok(())
}

fn file_logger(path: &str) -> Result<Logger> {
    Ok(Logger::new(FileSink::new(path, 1 << 20)?))
}

fn run(
    context: &OwnerContext,
    stack: &StackController,
    listeners: &mut Vec<Arc<dyn LifecycleListener>>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut pushed = 1;
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('p') => {
                push_screen(context, stack, listeners, pushed)?;
                pushed += 1;
            }
            KeyCode::Char('b') | KeyCode::Backspace => {
                if !stack.controller().handle_back() {
                    print!("(back not consumed)\r\n");
                }
            }
            KeyCode::Char('h') => {
                let view = stack.view();
                let next = if view.visibility().is_visible() {
                    Visibility::Invisible
                } else {
                    Visibility::Visible
                };
                view.set_visibility(next);
            }
            _ => continue,
        }
        stack.view().dispatch_layout();
        print!("stack: {:?}\r\n", stack);
        io::stdout().flush()?;
    }
}

fn push_screen(
    context: &OwnerContext,
    stack: &StackController,
    listeners: &mut Vec<Arc<dyn LifecycleListener>>,
    index: usize,
) -> Result<()> {
    let id = format!("screen-{index}");
    let controller = ViewController::new(context, id.clone());
    if let Some(logger) = context.config().logger.clone() {
        let listener: Arc<dyn LifecycleListener> =
            Arc::new(LifecycleLoggerListener::new(logger, id));
        controller.set_lifecycle_listener(&listener);
        listeners.push(listener);
    }
    stack.push(&controller)
}

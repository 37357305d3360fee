//! Single-step TUI monitor (`mpu run --monitor`): registers, flags, and the
//! next instruction, one `step` at a time. Reachable only from `run
//! --monitor`; the teacher's `simulator` crate declared `ratatui` and
//! `crossterm` for exactly this purpose but never implemented it.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use mpu_asm::linker::LinkResult;
use mpu_asm::machine::Machine;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

/// Runs `machine` under an interactive single-step monitor until the guest
/// halts, faults, or the user quits (`q`). `n`/`Enter` steps one
/// instruction; `r` runs freely to completion.
pub fn run(machine: &mut Machine, linked: &LinkResult) -> io::Result<()> {
    enable_raw_mode()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut halted = false;
    let mut last_error: Option<String> = None;

    let result = loop {
        terminal.draw(|frame| draw(frame, machine, linked, halted, last_error.as_deref()))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => match key.code {
                KeyCode::Char('q') => break Ok(()),
                KeyCode::Char('n') | KeyCode::Enter if !halted => {
                    let pc = machine.pc();
                    match machine.step(pc) {
                        Ok(new_pc) => halted = new_pc == pc,
                        Err(err) => {
                            last_error = Some(err.to_string());
                            halted = true;
                        }
                    }
                }
                KeyCode::Char('r') if !halted => match machine.run() {
                    Ok(()) => halted = true,
                    Err(err) => {
                        last_error = Some(err.to_string());
                        halted = true;
                    }
                },
                _ => {}
            },
            _ => {}
        }
    };

    disable_raw_mode()?;
    result
}

fn draw(
    frame: &mut ratatui::Frame,
    machine: &Machine,
    linked: &LinkResult,
    halted: bool,
    error: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0), Constraint::Length(3)])
        .split(frame.area());

    let flags = machine.flags();
    let registers = Paragraph::new(vec![
        Line::from(format!("pc={:#06x}  sp={:#06x}  fp={:#06x}", flags.pc, flags.sp, flags.fp)),
        Line::from(format!(
            "n={} z={} c={} bytes={}",
            flags.negative as u8, flags.zero as u8, flags.carry as u8, flags.bytes as u8
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Registers"));
    frame.render_widget(registers, chunks[0]);

    let location = nearest_source_line(linked, flags.pc);
    let body = Paragraph::new(location.unwrap_or_else(|| "(no debug info for this pc)".to_string()))
        .block(Block::default().borders(Borders::ALL).title("Next instruction"));
    frame.render_widget(body, chunks[1]);

    let status_text = if let Some(err) = error {
        err.to_string()
    } else if halted {
        "halted — q to quit".to_string()
    } else {
        "n/Enter: step   r: run to completion   q: quit".to_string()
    };
    let style = if error.is_some() { Style::default().fg(Color::Red) } else { Style::default() };
    let status = Paragraph::new(status_text).style(style).block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, chunks[2]);
}

fn nearest_source_line(linked: &LinkResult, pc: u16) -> Option<String> {
    linked
        .debug_info
        .iter()
        .rev()
        .find(|entry| entry.pc <= pc)
        .map(|entry| format!("{}:{} (pc={:#06x})", entry.file, entry.line, entry.pc))
}

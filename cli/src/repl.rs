use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use shapecheck_core::{
    Camera, CaptchaError, CaptchaSession, CaptchaState, CellIndex, RandomSource,
};
use web_time::{Duration, Instant};

use crate::render;

const HELP: &str = "\
commands:
  continue          take the selfie
  toggle <n>, t <n> select or unselect cell n (0-24)
  verify            submit the selection
  regenerate        start over after a failed verification
  retry-camera      ask for the camera again
  show [--json]     print the current state
  wait <ms>         let timers run for a while
  help              this text
  quit";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    Continue,
    Toggle(CellIndex),
    Verify,
    Regenerate,
    RetryCamera,
    Show { json: bool },
    Wait(Duration),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("Empty command, try `help`");
        };
        let arg = words.next();
        let command = match (name, arg) {
            ("continue" | "c", None) => Command::Continue,
            ("toggle" | "t", Some(index)) => Command::Toggle(
                index
                    .parse()
                    .with_context(|| format!("Not a cell index: {}", index))?,
            ),
            ("verify" | "v", None) => Command::Verify,
            ("regenerate" | "r", None) => Command::Regenerate,
            ("retry-camera", None) => Command::RetryCamera,
            ("show" | "s", None) => Command::Show { json: false },
            ("show" | "s", Some("--json")) => Command::Show { json: true },
            ("wait" | "w", Some(millis)) => Command::Wait(Duration::from_millis(
                millis
                    .parse()
                    .with_context(|| format!("Not a number of milliseconds: {}", millis))?,
            )),
            ("help" | "h" | "?", None) => Command::Help,
            ("quit" | "q" | "exit", None) => Command::Quit,
            _ => bail!("Unknown command `{}`, try `help`", line.trim()),
        };
        if words.next().is_some() {
            bail!("Too many arguments for `{}`", name);
        }
        Ok(command)
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}

/// Line-oriented driver of one captcha session.
pub struct Repl<C: Camera, R: RandomSource, In, Out> {
    session: CaptchaSession<C, R>,
    input: In,
    output: Out,
}

impl<C: Camera, R: RandomSource, In: BufRead, Out: Write> Repl<C, R, In, Out> {
    pub fn new(session: CaptchaSession<C, R>, input: In, output: Out) -> Self {
        Self {
            session,
            input,
            output,
        }
    }

    pub fn run(mut self) -> Result<()> {
        self.show(false)?;
        let mut line = String::new();
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    writeln!(self.output, "{:#}", err)?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            self.session.poll();
            self.execute(command)?;

            if self.session.state().is_final() {
                break;
            }
        }
        self.session.teardown();
        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        log::debug!("command: {:?}", command);
        let result = match command {
            Command::Continue => self.session.proceed().map(drop),
            Command::Toggle(index) => self.session.toggle_cell(index).map(drop),
            Command::Verify => self.session.verify().map(drop),
            Command::Regenerate => self.session.regenerate().map(drop),
            Command::RetryCamera => self.session.connect_camera().map(drop),
            Command::Show { json } => return self.show(json),
            Command::Wait(duration) => {
                self.wait(duration);
                return self.show(false);
            }
            Command::Help => {
                writeln!(self.output, "{}", HELP)?;
                return Ok(());
            }
            Command::Quit => return Ok(()),
        };

        if let Err(err) = result {
            return self.rejected(err);
        }
        self.settle();
        self.show(false)
    }

    /// Runs timers until the session leaves a state that is waiting on one.
    fn settle(&mut self) {
        while matches!(
            self.session.state(),
            CaptchaState::TakingSelfie | CaptchaState::Verifying
        ) {
            let Some(deadline) = self.session.next_deadline() else {
                break;
            };
            sleep_until(deadline);
            self.session.poll();
        }
    }

    fn wait(&mut self, duration: Duration) {
        let end = Instant::now() + duration;
        while let Some(deadline) = self.session.next_deadline().filter(|&due| due <= end) {
            sleep_until(deadline);
            self.session.poll();
        }
        sleep_until(end);
        self.session.poll();
    }

    fn rejected(&mut self, err: CaptchaError) -> Result<()> {
        writeln!(self.output, "rejected: {}", err)?;
        Ok(())
    }

    fn show(&mut self, json: bool) -> Result<()> {
        let view = self.session.view();
        if json {
            serde_json::to_writer_pretty(&mut self.output, &view)?;
            writeln!(self.output)?;
        } else {
            let mut text = String::new();
            render::render(&mut text, &view)?;
            write!(self.output, "{}", text)?;
        }
        Ok(())
    }
}

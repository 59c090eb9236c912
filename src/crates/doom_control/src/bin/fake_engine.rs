use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use doom_control::protocol::{
    encode_line, EngineReply, EngineRequest, FramePayload, READY_LINE,
};
use doom_control::{Button, EngineVariables, GameVariable, ScreenFormat};

/// Behavior knobs read from the command line.
#[derive(Debug, Default)]
struct Script {
    width: usize,
    height: usize,
    format: ScreenFormat,
    die_at: Option<u32>,
    map_end_at: Option<u32>,
    exit_at: Option<u32>,
    hang_at: Option<u32>,
    shaping_per_tic: i32,
    chatty: bool,
}

impl Script {
    fn from_args(args: impl Iterator<Item = String>) -> Self {
        let mut script = Script {
            width: 32,
            height: 24,
            ..Script::default()
        };
        let args: Vec<String> = args.collect();
        let mut iter = args.iter().peekable();
        while let Some(flag) = iter.next() {
            let value = iter.peek().map(|value| value.as_str());
            match (flag.as_str(), value) {
                ("-width", Some(v)) => script.width = v.parse().unwrap_or(script.width),
                ("-height", Some(v)) => script.height = v.parse().unwrap_or(script.height),
                ("+screen_format", Some(v)) => {
                    script.format = serde_json::from_value(serde_json::Value::String(v.to_string()))
                        .unwrap_or_default()
                }
                ("+fake_die_at", Some(v)) => script.die_at = v.parse().ok(),
                ("+fake_map_end_at", Some(v)) => script.map_end_at = v.parse().ok(),
                ("+fake_exit_at", Some(v)) => script.exit_at = v.parse().ok(),
                ("+fake_hang_at", Some(v)) => script.hang_at = v.parse().ok(),
                ("+fake_shaping", Some(v)) => script.shaping_per_tic = v.parse().unwrap_or(0),
                ("+fake_chatty", _) => script.chatty = true,
                _ => {}
            }
        }
        script
    }
}

struct World {
    script: Script,
    buttons: Vec<i32>,
    variables: EngineVariables,
}

impl World {
    fn new(script: Script) -> Self {
        let mut world = Self {
            script,
            buttons: vec![0; Button::COUNT],
            variables: EngineVariables::default(),
        };
        world.reset();
        world
    }

    fn reset(&mut self) {
        self.buttons = vec![0; Button::COUNT];
        self.variables = EngineVariables::default();
        self.variables.set(GameVariable::Health, 100);
        self.variables.set(GameVariable::Ammo2, 50);
        self.variables.set(GameVariable::OnGround, 1);
    }

    fn button(&self, button: Button) -> i32 {
        self.buttons.get(button.index()).copied().unwrap_or(0)
    }

    fn tic(&mut self) {
        let tic = self.variables.tic + 1;
        if self.script.exit_at == Some(tic) {
            eprintln!("fake engine crashing at tic {tic}");
            std::process::exit(3);
        }
        if self.script.hang_at == Some(tic) {
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        }
        self.variables.tic = tic;
        if self.variables.player_dead() {
            return;
        }

        let forward = self.button(Button::MoveForward) - self.button(Button::MoveBackward)
            + self.button(Button::MoveForwardBackwardDelta);
        let x = self.variables.get(GameVariable::PositionX);
        self.variables.set(GameVariable::PositionX, x + forward);

        if self.button(Button::Attack) != 0 {
            let ammo = self.variables.get(GameVariable::Ammo2);
            self.variables.set(GameVariable::Ammo2, (ammo - 1).max(0));
        }

        let shaping = self.variables.get(GameVariable::User1);
        self.variables
            .set(GameVariable::User1, shaping.wrapping_add(self.script.shaping_per_tic));

        if self.script.die_at.is_some_and(|at| tic >= at) {
            self.variables.set(GameVariable::Health, 0);
            self.variables.set(GameVariable::Dead, 1);
        }
        if self.script.map_end_at.is_some_and(|at| tic >= at) {
            self.variables.map_ended = true;
        }
    }

    fn state(&self, render: bool) -> EngineReply {
        let frame = render.then(|| FramePayload {
            width: self.script.width,
            height: self.script.height,
            format: self.script.format,
            data: vec![
                (self.variables.tic % 256) as u8;
                self.script.width * self.script.height * self.script.format.channels()
            ],
        });
        EngineReply::State {
            variables: self.variables.clone(),
            frame,
        }
    }

    fn handle(&mut self, request: EngineRequest) -> (EngineReply, bool) {
        match request {
            EngineRequest::NewEpisode { .. } => {
                self.reset();
                (self.state(true), true)
            }
            EngineRequest::SetButtons { values } => {
                if values.len() != Button::COUNT {
                    let message = format!("expected {} buttons, got {}", Button::COUNT, values.len());
                    return (EngineReply::Error { message }, true);
                }
                self.buttons = values;
                (EngineReply::Ok, true)
            }
            EngineRequest::Advance { tics, render } => {
                for _ in 0..tics {
                    self.tic();
                }
                (self.state(render), true)
            }
            EngineRequest::Command { text } => {
                eprintln!("console: {text}");
                (EngineReply::Ok, true)
            }
            EngineRequest::Shutdown => (EngineReply::Ok, false),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let script = Script::from_args(std::env::args().skip(1));
    let chatty = script.chatty;
    let mut world = World::new(script);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if chatty {
        writeln!(out, "fake engine warming up")?;
        eprintln!("fake engine stderr hello");
    }
    writeln!(out, "{READY_LINE}")?;
    out.flush()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (reply, keep_running) = match serde_json::from_str::<EngineRequest>(&line) {
            Ok(request) => world.handle(request),
            Err(err) => (
                EngineReply::Error {
                    message: format!("bad request: {err}"),
                },
                true,
            ),
        };
        out.write_all(encode_line(&reply)?.as_bytes())?;
        out.flush()?;
        if !keep_running {
            break;
        }
    }
    Ok(())
}

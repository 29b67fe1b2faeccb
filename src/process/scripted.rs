//! Scripted process runner for tests
//!
//! [`FakeFirmware`] imitates git, cmake and make against the real
//! filesystem: clones create directories, checkouts write the tag's
//! options manifest, cmake records its flags and make drops an artifact
//! for known boards.

use super::{CommandOutput, Invocation, ProcessRunner};
use crate::error::BuildBotResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Mutex;

type Handler = dyn Fn(&Invocation) -> BuildBotResult<CommandOutput> + Send + Sync;

/// Runner that answers every invocation from a closure and records it
pub(crate) struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(
        handler: impl Fn(&Invocation) -> BuildBotResult<CommandOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Every recorded command line, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }

    /// Whether any recorded invocation ran `program`
    pub fn ran(&self, program: &str) -> bool {
        self.calls().iter().any(|c| c.program == program)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> BuildBotResult<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        (self.handler)(invocation)
    }
}

/// Filesystem-backed imitation of the firmware repository and toolchain
pub(crate) struct FakeFirmware {
    /// Tag name to options manifest content (`None` = no options file)
    pub tags: BTreeMap<String, Option<String>>,
    /// Boards `make` knows how to produce
    pub boards: Vec<String>,
    pub fail_configure: bool,
    pub fail_pull: bool,
    /// Number of clone attempts that fail before one succeeds
    pub clone_failures: Mutex<u32>,
}

impl Default for FakeFirmware {
    fn default() -> Self {
        Self {
            tags: BTreeMap::new(),
            boards: vec!["mega2560".to_string()],
            fail_configure: false,
            fail_pull: false,
            clone_failures: Mutex::new(0),
        }
    }
}

/// Bytes make writes as the artifact; deliberately not valid UTF-8
pub(crate) const FAKE_ARTIFACT: &[u8] = b":100000000C94\x00\xff\xfe\n:00000001FF\n";

impl FakeFirmware {
    pub fn with_tag(mut self, tag: &str, options: Option<&str>) -> Self {
        self.tags.insert(tag.to_string(), options.map(str::to_string));
        self
    }

    pub fn into_runner(self) -> ScriptedRunner {
        ScriptedRunner::new(move |inv| self.handle(inv))
    }

    fn handle(&self, inv: &Invocation) -> BuildBotResult<CommandOutput> {
        match inv.program.as_str() {
            "git" => self.git(inv),
            "cmake" => Ok(self.cmake(inv)),
            "make" => Ok(self.make(inv)),
            "uname" => Ok(CommandOutput::ok("Linux fakehost 6.1.0 x86_64\n")),
            other => Ok(CommandOutput::failed(127, format!("{}: not found", other))),
        }
    }

    fn git(&self, inv: &Invocation) -> BuildBotResult<CommandOutput> {
        let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
        let output = match args.as_slice() {
            ["clone", _source, dest] => {
                let mut failures = self.clone_failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Ok(CommandOutput::failed(128, "fatal: unable to access remote"));
                }
                fs::create_dir_all(inv.cwd.join(dest)).unwrap();
                CommandOutput::ok("")
            }
            ["rev-parse", "--abbrev-ref", "HEAD"] => CommandOutput::ok("master\n"),
            ["tag", "-l"] => CommandOutput::ok(self.tag_listing()),
            ["tag", "-l", _pattern] => CommandOutput::ok(format!("{}\n\n", self.tag_listing())),
            ["tag", "-d", ..] => CommandOutput::ok(""),
            ["pull"] if self.fail_pull => CommandOutput::failed(1, "fatal: no remote"),
            ["pull"] => CommandOutput::ok("Already up to date.\n"),
            ["checkout", "--quiet", "master"] => CommandOutput::ok(""),
            ["checkout", "--quiet", rev] => match self.tags.get(*rev) {
                Some(options) => {
                    let manifest = inv.cwd.join("options.json");
                    match options {
                        Some(content) => fs::write(&manifest, content).unwrap(),
                        None => {
                            let _ = fs::remove_file(&manifest);
                        }
                    }
                    CommandOutput::ok("")
                }
                None => CommandOutput::failed(
                    1,
                    format!("error: pathspec '{}' did not match", rev),
                ),
            },
            _ => CommandOutput::failed(129, format!("unexpected git {}", args.join(" "))),
        };
        Ok(output)
    }

    fn tag_listing(&self) -> String {
        self.tags.keys().cloned().collect::<Vec<_>>().join("\n")
    }

    fn cmake(&self, inv: &Invocation) -> CommandOutput {
        if self.fail_configure {
            return CommandOutput::failed(1, "CMake Error at CMakeLists.txt:12: bad option");
        }
        fs::write(inv.cwd.join("CMakeCache.txt"), inv.args.join("\n")).unwrap();
        CommandOutput::ok("-- Configuring done\n-- Generating done\n")
    }

    fn make(&self, inv: &Invocation) -> CommandOutput {
        let cache = fs::read_to_string(inv.cwd.join("CMakeCache.txt")).unwrap_or_default();
        let board = cache.lines().find_map(|l| l.strip_prefix("-Dboard="));
        match board {
            Some(board) if self.boards.iter().any(|b| b == board) => {
                let out = inv.cwd.join("src");
                fs::create_dir_all(&out).unwrap();
                fs::write(out.join(format!("BrewTroller-{}.hex", board)), FAKE_ARTIFACT).unwrap();
                CommandOutput::ok("[100%] Built target BrewTroller\n")
            }
            _ => CommandOutput::ok("[100%] Built target nothing\n"),
        }
    }
}

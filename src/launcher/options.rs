//! Command-line option parsing
//!
//! Flags are tokenized by clap. Immediate flags (`-b -i -q -V -h -f -p -F`)
//! set [`ParsedOptions`]; deferred flags (`-I -A -u -l -L -e -E`) become
//! [`DeferredAction`]s. clap reports values grouped per flag, so the
//! command-line order of deferred actions is recovered from the argv index
//! of every value.
//!
//! The first non-option token ends scanning: it and everything after it are
//! operands, even tokens that look like flags.

use std::str::FromStr;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::warn;

use crate::launcher::actions::{ActionKind, DeferredAction};
use crate::runtime::{CompilerFlag, RuntimeFlag, RuntimeSettings};

/// Output of `-V`
pub static VERSION_LINE: Lazy<String> = Lazy::new(|| {
    format!(
        "gosh scheme shell, version {} [utf-8], {}-{}",
        crate::VERSION,
        std::env::consts::ARCH,
        std::env::consts::OS
    )
});

const USAGE: &str = "\
Usage: gosh [-biqV][-I<path>][-A<path>][-u<module>][-l<file>][-L<file>][-e<expr>][-E<expr>][-p<type>][-F<feature>][-f<flag>][--] [file]
options:
  -V       Prints version and exits.
  -b       Batch mode.  Doesn't print prompts.  Supersedes -i.
  -i       Interactive mode.  Forces to print prompts.
  -q       Doesn't read the default initialization file.
  -I<path> Adds <path> to the head of the load path list.
  -A<path> Adds <path> to the tail of the load path list.
  -u<module> (use) load and import <module>
  -l<file> Loads <file> before executing the script file or
           entering repl.
  -L<file> Like -l, but doesn't complain if <file> doesn't exist.
  -e<expr> Evaluate Scheme expression <expr> before executing
           the script file or entering repl.
  -E<expr> Similar to -e, but reads <expr> as if it is surrounded
           by parenthesis.
  -p<type> Turns on the profiler.  <type> can be 'time' or 'load'.
  -F<feature> Makes <feature> available in cond-expand forms
  -f<flag> Sets various flags
      case-fold       uses case-insensitive reader (as in R5RS)
      load-verbose    report while loading files
      no-inline       don't inline procedures & constants (combined
                      no-inline-globals, no-inline-locals, and
                      no-inline-constants.)
      no-inline-globals don't inline global procedures.
      no-inline-locals  don't inline local procedures.
      no-inline-constants don't inline constants.
      no-post-inline-pass  don't run post-inline optimization pass.
      no-source-info  don't preserve source information for debugging
      test            test mode, to run gosh inside the build tree
";

/// The usage text printed by `-h` and on command-line errors
pub fn usage() -> &'static str {
    USAGE
}

/// Flags that take an argument, adjacent or in the next token
const VALUE_FLAGS: &str = "eEplLuFfIA";

/// Tokenizer grammar
#[derive(Debug, Parser)]
#[command(
    name = "gosh",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Flags {
    #[arg(short = 'V', overrides_with = "show_version")]
    show_version: bool,

    #[arg(short = 'h', overrides_with = "show_help")]
    show_help: bool,

    #[arg(short = 'b', overrides_with = "batch")]
    batch: bool,

    #[arg(short = 'i', overrides_with = "interactive")]
    interactive: bool,

    #[arg(short = 'q', overrides_with = "no_init_file")]
    no_init_file: bool,

    #[arg(short = 'f', value_name = "FLAG", allow_hyphen_values = true)]
    further: Vec<String>,

    #[arg(short = 'p', value_name = "TYPE", allow_hyphen_values = true)]
    profiler: Vec<String>,

    #[arg(short = 'F', value_name = "FEATURE", allow_hyphen_values = true)]
    features: Vec<String>,

    #[arg(short = 'I', value_name = "PATH", allow_hyphen_values = true)]
    load_path_front: Vec<String>,

    #[arg(short = 'A', value_name = "PATH", allow_hyphen_values = true)]
    load_path_back: Vec<String>,

    #[arg(short = 'u', value_name = "MODULE", allow_hyphen_values = true)]
    use_module: Vec<String>,

    #[arg(short = 'l', value_name = "FILE", allow_hyphen_values = true)]
    load: Vec<String>,

    #[arg(short = 'L', value_name = "FILE", allow_hyphen_values = true)]
    load_optional: Vec<String>,

    #[arg(short = 'e', value_name = "EXPR", allow_hyphen_values = true)]
    eval: Vec<String>,

    #[arg(short = 'E', value_name = "EXPR", allow_hyphen_values = true)]
    eval_wrapped: Vec<String>,

    /// Script file and its arguments
    #[arg(num_args = 1.., trailing_var_arg = true)]
    operands: Vec<String>,
}

/// Deferred flags by clap argument id
const DEFERRED_FLAGS: &[(&str, ActionKind)] = &[
    ("load_path_front", ActionKind::AddLoadPathFront),
    ("load_path_back", ActionKind::AddLoadPathBack),
    ("use_module", ActionKind::Require),
    ("load", ActionKind::LoadFile),
    ("load_optional", ActionKind::LoadFileOptional),
    ("eval", ActionKind::EvalExpr),
    ("eval_wrapped", ActionKind::EvalExprParenWrapped),
];

/// Named toggles selected with `-f`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FurtherOption {
    CaseFold,
    LoadVerbose,
    NoInline,
    NoInlineGlobals,
    NoInlineLocals,
    NoInlineConstants,
    NoPostInlinePass,
    NoSourceInfo,
    Test,
    CollectStats,
    NoCombineInstructions,
    DebugCompiler,
    LimitModuleMutation,
}

impl FurtherOption {
    pub const ALL: &'static [FurtherOption] = &[
        FurtherOption::CaseFold,
        FurtherOption::LoadVerbose,
        FurtherOption::NoInline,
        FurtherOption::NoInlineGlobals,
        FurtherOption::NoInlineLocals,
        FurtherOption::NoInlineConstants,
        FurtherOption::NoPostInlinePass,
        FurtherOption::NoSourceInfo,
        FurtherOption::Test,
        FurtherOption::CollectStats,
        FurtherOption::NoCombineInstructions,
        FurtherOption::DebugCompiler,
        FurtherOption::LimitModuleMutation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FurtherOption::CaseFold => "case-fold",
            FurtherOption::LoadVerbose => "load-verbose",
            FurtherOption::NoInline => "no-inline",
            FurtherOption::NoInlineGlobals => "no-inline-globals",
            FurtherOption::NoInlineLocals => "no-inline-locals",
            FurtherOption::NoInlineConstants => "no-inline-constants",
            FurtherOption::NoPostInlinePass => "no-post-inline-pass",
            FurtherOption::NoSourceInfo => "no-source-info",
            FurtherOption::Test => "test",
            FurtherOption::CollectStats => "collect-stats",
            FurtherOption::NoCombineInstructions => "no-combine-instructions",
            FurtherOption::DebugCompiler => "debug-compiler",
            FurtherOption::LimitModuleMutation => "limit-module-mutation",
        }
    }

    /// Development toggles are accepted but not advertised
    pub fn is_public(self) -> bool {
        !matches!(
            self,
            FurtherOption::CollectStats
                | FurtherOption::NoCombineInstructions
                | FurtherOption::DebugCompiler
                | FurtherOption::LimitModuleMutation
        )
    }

    pub fn compiler_flags(self) -> &'static [CompilerFlag] {
        match self {
            FurtherOption::NoInline => &[
                CompilerFlag::NoInlineGlobals,
                CompilerFlag::NoInlineLocals,
                CompilerFlag::NoInlineConstants,
            ],
            FurtherOption::NoInlineGlobals => &[CompilerFlag::NoInlineGlobals],
            FurtherOption::NoInlineLocals => &[CompilerFlag::NoInlineLocals],
            FurtherOption::NoInlineConstants => &[CompilerFlag::NoInlineConstants],
            FurtherOption::NoPostInlinePass => &[CompilerFlag::NoPostInlinePass],
            FurtherOption::NoSourceInfo => &[CompilerFlag::NoSourceInfo],
            FurtherOption::NoCombineInstructions => &[CompilerFlag::NoCombineInstructions],
            FurtherOption::DebugCompiler => &[CompilerFlag::DebugCompiler],
            _ => &[],
        }
    }

    pub fn runtime_flags(self) -> &'static [RuntimeFlag] {
        match self {
            FurtherOption::CaseFold => &[RuntimeFlag::CaseFold],
            FurtherOption::LoadVerbose => &[RuntimeFlag::LoadVerbose],
            FurtherOption::CollectStats => &[RuntimeFlag::CollectVmStats],
            FurtherOption::LimitModuleMutation => &[RuntimeFlag::LimitModuleMutation],
            _ => &[],
        }
    }

    /// `-fcase-fold, -fload-verbose, ...` for diagnostics
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .filter(|opt| opt.is_public())
            .map(|opt| format!("-f{}", opt.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for FurtherOption {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|opt| opt.name() == s)
            .ok_or_else(|| OptionError::UnknownFurtherOption(s.to_string()))
    }
}

/// Instruments selected with `-p`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerOption {
    /// Time profiler, report at exit
    Time,
    /// Per-file load statistics
    Load,
}

impl FromStr for ProfilerOption {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(ProfilerOption::Time),
            "load" => Ok(ProfilerOption::Load),
            _ => Err(()),
        }
    }
}

/// Immediate options; read-only once parsing is finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOptions {
    pub load_init_file: bool,
    pub batch_mode: bool,
    pub interactive_mode: bool,
    pub test_mode: bool,
    /// `-ptime`
    pub profiling_mode: bool,
    /// `-fcollect-stats`
    pub stats_mode: bool,
    /// `-pload`
    pub load_stats_mode: bool,
    pub further: IndexSet<FurtherOption>,
    /// `-F` features, in command-line order
    pub features: IndexSet<String>,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            load_init_file: true,
            batch_mode: false,
            interactive_mode: false,
            test_mode: false,
            profiling_mode: false,
            stats_mode: false,
            load_stats_mode: false,
            further: IndexSet::new(),
            features: IndexSet::new(),
        }
    }
}

impl ParsedOptions {
    fn apply_further(
        &mut self,
        option: FurtherOption,
    ) {
        match option {
            FurtherOption::Test => self.test_mode = true,
            FurtherOption::CollectStats => self.stats_mode = true,
            _ => {}
        }
        self.further.insert(option);
    }

    fn apply_profiler(
        &mut self,
        value: &str,
    ) {
        match value.parse::<ProfilerOption>() {
            Ok(ProfilerOption::Time) => self.profiling_mode = true,
            Ok(ProfilerOption::Load) => self.load_stats_mode = true,
            Err(()) => warn!(
                "unknown -p option: {}; supported profiling options are: -ptime, -pload",
                value
            ),
        }
    }

    /// What the runtime needs to know from the command line
    pub fn runtime_settings(&self) -> RuntimeSettings {
        let mut settings = RuntimeSettings {
            features: self.features.clone(),
            ..RuntimeSettings::default()
        };
        for option in &self.further {
            settings.compiler_flags.extend(option.compiler_flags().iter().copied());
            settings.runtime_flags.extend(option.runtime_flags().iter().copied());
        }
        if self.load_stats_mode {
            settings.runtime_flags.insert(RuntimeFlag::CollectLoadStats);
        }
        settings
    }
}

/// A fully parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub options: ParsedOptions,
    /// Deferred actions in command-line order
    pub actions: Vec<DeferredAction>,
    /// Index into the parsed arguments of the first operand; equals their
    /// length when there is none
    pub first_operand: usize,
    /// The script name followed by its arguments
    pub operands: Vec<String>,
}

/// Parsing stopped; the process should exit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("help requested")]
    Help,

    #[error("version requested")]
    Version,

    #[error("{0}")]
    Usage(String),

    #[error("unknown -f option: {0}")]
    UnknownFurtherOption(String),
}

impl OptionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            OptionError::Version => 0,
            _ => 1,
        }
    }

    /// Print the version line to stdout, or the diagnostic to stderr, and
    /// return the exit status
    pub fn report(&self) -> i32 {
        match self {
            OptionError::Version => println!("{}", *VERSION_LINE),
            OptionError::Help => eprint!("{}", usage()),
            OptionError::Usage(message) => {
                eprintln!("gosh: {}", message);
                eprint!("{}", usage());
            }
            OptionError::UnknownFurtherOption(_) => {
                eprintln!("{}", self);
                eprintln!("supported options are: {}", FurtherOption::supported_list());
            }
        }
        self.exit_code()
    }
}

/// Whether `-V` appears among the options, scanning the way getopt does
///
/// `-V` wins over every other flag, including ones clap would reject.
pub fn version_requested(args: &[String]) -> bool {
    let mut tokens = args.iter();
    while let Some(token) = tokens.next() {
        if token == "--" || token == "-" || !token.starts_with('-') {
            return false;
        }
        let mut chars = token[1..].chars();
        while let Some(c) = chars.next() {
            if c == 'V' {
                return true;
            }
            if VALUE_FLAGS.contains(c) {
                if chars.as_str().is_empty() {
                    tokens.next();
                }
                break;
            }
        }
    }
    false
}

/// Split `-f=x` into `-f` `=x`, so the value keeps its `=` as with getopt
///
/// clap drops an `=` between a short flag and its attached value.
fn keep_attached_equals(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut tokens = args.iter();
    while let Some(token) = tokens.next() {
        if token == "--" || token == "-" || !token.starts_with('-') {
            out.push(token.clone());
            out.extend(tokens.cloned());
            break;
        }
        let mut split_at = None;
        let mut value_follows = false;
        for (i, c) in token.char_indices().skip(1) {
            if VALUE_FLAGS.contains(c) {
                let end = i + c.len_utf8();
                if token[end..].starts_with('=') {
                    split_at = Some(end);
                } else {
                    value_follows = token[end..].is_empty();
                }
                break;
            }
        }
        match split_at {
            Some(at) => {
                out.push(token[..at].to_string());
                out.push(token[at..].to_string());
            }
            None => out.push(token.clone()),
        }
        if value_follows {
            out.extend(tokens.next().cloned());
        }
    }
    out
}

fn clap_message(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or("invalid command line");
    first.trim_start_matches("error: ").to_string()
}

/// Merge the values of every deferred flag by their argv index
fn collect_actions(matches: &ArgMatches) -> Vec<DeferredAction> {
    let mut events: Vec<(usize, DeferredAction)> = Vec::new();
    for &(id, kind) in DEFERRED_FLAGS {
        let (Some(values), Some(indices)) =
            (matches.get_many::<String>(id), matches.indices_of(id))
        else {
            continue;
        };
        events.extend(
            indices
                .zip(values)
                .map(|(index, value)| (index, DeferredAction::new(kind, value.as_str()))),
        );
    }
    events.sort_by_key(|(index, _)| *index);
    events.into_iter().map(|(_, action)| action).collect()
}

/// Parse `args` (without the program name)
pub fn parse_command_line(args: &[String]) -> Result<CommandLine, OptionError> {
    if version_requested(args) {
        return Err(OptionError::Version);
    }

    let matches = Flags::command()
        .try_get_matches_from(keep_attached_equals(args))
        .map_err(|e| OptionError::Usage(clap_message(&e)))?;
    let flags =
        Flags::from_arg_matches(&matches).map_err(|e| OptionError::Usage(clap_message(&e)))?;

    if flags.show_version {
        return Err(OptionError::Version);
    }
    if flags.show_help {
        return Err(OptionError::Help);
    }

    let mut options = ParsedOptions {
        load_init_file: !flags.no_init_file,
        batch_mode: flags.batch,
        interactive_mode: flags.interactive,
        ..ParsedOptions::default()
    };
    for name in &flags.further {
        options.apply_further(name.parse()?);
    }
    for value in &flags.profiler {
        options.apply_profiler(value);
    }
    options.features.extend(flags.features.iter().cloned());

    let actions = collect_actions(&matches);
    let first_operand = args.len() - flags.operands.len();

    Ok(CommandLine {
        options,
        actions,
        first_operand,
        operands: flags.operands,
    })
}

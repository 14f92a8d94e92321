use std::io::{BufRead, Write};

use crate::app::Session;
use crate::error::{AppError, Result};
use crate::tree::path::ROOT_ID;

/// A single user command, from the shell or from a CLI subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Tree { verbose: bool },
    Pwd,
    /// `cd` target: an index, a child id, `..`, `/`, or a full unique path.
    Enter(String),
    Mkdir(String),
    Rename { index: usize, name: String },
    Remove(usize),
    Add(String),
    Move { record: String, path: String },
    Records,
    /// Run a command on a throwaway copy and show the resulting tree.
    Preview(Box<Command>),
    /// Log the tree with records.
    Print,
    Save,
    Help,
    Quit,
}

/// Whether the shell keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
ls                  list folders and records here
tree [-v]           show the whole tree (-v adds records)
pwd                 show the current path
cd <n|id|..|/|path> change folder
mkdir <name>        create a folder here
rename <n> <name>   rename folder n
rm <n>              delete folder n, moving its records to the root
add <record>        file a record here
mv <record> <path>  file a record into the folder at a unique path
records             list every record
preview <command>   show what a command would do, without keeping it
print               log the tree with records
save                write the folder file
quit                leave the shell";

fn parse_index(arg: &str) -> Result<usize> {
    arg.parse()
        .map_err(|_| AppError::InvalidInput(format!("'{}' is not a folder number", arg)))
}

fn required<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str> {
    match arg {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err(AppError::InvalidInput(format!("missing {}", what))),
    }
}

/// Parse one shell line. Blank lines yield `None`.
///
/// Names run to the end of the line, so they may contain spaces.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let rest = if rest.is_empty() { None } else { Some(rest) };

    let command = match word {
        "ls" => Command::List,
        "tree" => Command::Tree {
            verbose: matches!(rest, Some("-v") | Some("--verbose")),
        },
        "pwd" => Command::Pwd,
        "cd" => Command::Enter(rest.unwrap_or("/").to_string()),
        "mkdir" => Command::Mkdir(required(rest, "folder name")?.to_string()),
        "rename" => {
            let args = required(rest, "folder number")?;
            let (index, name) = match args.split_once(char::is_whitespace) {
                Some((i, n)) => (i, n.trim()),
                None => (args, ""),
            };
            Command::Rename {
                index: parse_index(index)?,
                name: required(Some(name), "new name")?.to_string(),
            }
        }
        "rm" => Command::Remove(parse_index(required(rest, "folder number")?)?),
        "add" => Command::Add(required(rest, "record name")?.to_string()),
        "mv" => {
            let args = required(rest, "record name")?;
            let (record, path) = match args.rsplit_once(char::is_whitespace) {
                Some((r, p)) => (r.trim(), p),
                None => (args, ""),
            };
            Command::Move {
                record: record.to_string(),
                path: required(Some(path), "target path")?.to_string(),
            }
        }
        "records" => Command::Records,
        "preview" => match parse_line(required(rest, "command to preview")?)? {
            Some(Command::Quit) | Some(Command::Preview(_)) | None => {
                return Err(AppError::InvalidInput("nothing to preview".into()))
            }
            Some(inner) => Command::Preview(Box::new(inner)),
        },
        "print" => Command::Print,
        "save" => Command::Save,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(AppError::InvalidInput(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn enter(session: &mut Session, target: &str) -> Result<()> {
    match target {
        "/" => {
            session.go_root();
            Ok(())
        }
        ".." => {
            session.back();
            Ok(())
        }
        t if t.contains('/') => session.navigate_to(t),
        t => match t.parse::<usize>() {
            Ok(index) => session.enter(index),
            // A child may itself be called `base#0`; it wins over the root.
            Err(_) => match session.enter_id(t) {
                Err(_) if t == ROOT_ID => {
                    session.go_root();
                    Ok(())
                }
                entered => entered,
            },
        },
    }
}

fn list(session: &Session, out: &mut impl Write) -> Result<()> {
    let current = session.current()?;
    writeln!(out, "{}", session.display_path())?;
    for (i, folder) in current.children().iter().enumerate() {
        writeln!(out, "  [{}] {}/ ({})", i, folder.display_name(), folder.unique_id())?;
    }
    for record in current.entries() {
        writeln!(out, "  - {}", record.name)?;
    }
    writeln!(
        out,
        "{} items: {} folders, {} records",
        current.size(),
        current.folders(),
        current.entry_count()
    )?;
    Ok(())
}

fn autosave(session: &Session, enabled: bool, out: &mut impl Write) -> Result<()> {
    if enabled && !session.save() {
        writeln!(out, "warning: could not save {}", session.save_file().display())?;
    }
    Ok(())
}

/// Run one command against the session, writing any output to `out`.
pub fn execute(
    session: &mut Session,
    command: Command,
    autosave_enabled: bool,
    out: &mut impl Write,
) -> Result<Flow> {
    match command {
        Command::List => list(session, out)?,
        Command::Tree { verbose } => write!(out, "{}", session.dump(verbose))?,
        Command::Pwd => {
            writeln!(out, "{} (depth {})", session.display_path(), session.depth())?;
            writeln!(out, "{}", session.unique_path())?;
        }
        Command::Enter(target) => enter(session, &target)?,
        Command::Mkdir(name) => {
            let id = session.add_folder(&name)?;
            writeln!(out, "created {}", id)?;
            autosave(session, autosave_enabled, out)?;
        }
        Command::Rename { index, name } => {
            session.rename(index, &name)?;
            autosave(session, autosave_enabled, out)?;
        }
        Command::Remove(index) => {
            if !session.delete(index)? {
                writeln!(out, "warning: folder removed, but not every record could be moved or saved")?;
            }
        }
        Command::Add(name) => session.add_record(&name)?,
        Command::Move { record, path } => session.move_record(&record, &path)?,
        Command::Records => {
            for record in session.records() {
                writeln!(out, "{}", record)?;
            }
        }
        Command::Preview(inner) => {
            let mut preview = session.fork();
            execute(&mut preview, *inner, false, out)?;
            write!(out, "{}", preview.dump(true))?;
        }
        Command::Print => session.print(),
        Command::Save => {
            if session.save() {
                writeln!(out, "saved {}", session.save_file().display())?;
            } else {
                writeln!(out, "save failed")?;
            }
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Read commands line by line until `quit` or end of input.
///
/// Errors from individual commands are printed and the shell carries on.
pub fn run_shell(
    session: &mut Session,
    input: impl BufRead,
    out: &mut impl Write,
    autosave_enabled: bool,
) -> Result<()> {
    write!(out, "{}> ", session.display_path())?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let outcome = parse_line(&line)
            .and_then(|command| match command {
                Some(command) => execute(session, command, autosave_enabled, out),
                None => Ok(Flow::Continue),
            });
        match outcome {
            Ok(Flow::Quit) => return Ok(()),
            Ok(Flow::Continue) => {}
            Err(e) => writeln!(out, "error: {}", e)?,
        }
        write!(out, "{}> ", session.display_path())?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn run(session: &mut Session, script: &str) -> String {
        let mut out = Vec::new();
        run_shell(session, Cursor::new(script), &mut out, true).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_line("ls").unwrap(), Some(Command::List));
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(
            parse_line("tree -v").unwrap(),
            Some(Command::Tree { verbose: true })
        );
        assert_eq!(parse_line("cd").unwrap(), Some(Command::Enter("/".into())));
        assert_eq!(parse_line("rm 2").unwrap(), Some(Command::Remove(2)));
    }

    #[test]
    fn parse_names_keep_spaces() {
        assert_eq!(
            parse_line("mkdir My Worlds").unwrap(),
            Some(Command::Mkdir("My Worlds".into()))
        );
        assert_eq!(
            parse_line("rename 1 Old Saves").unwrap(),
            Some(Command::Rename {
                index: 1,
                name: "Old Saves".into()
            })
        );
        assert_eq!(
            parse_line("mv Big World base#0/A#0").unwrap(),
            Some(Command::Move {
                record: "Big World".into(),
                path: "base#0/A#0".into()
            })
        );
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(parse_line("frobnicate"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_line("rm x"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_line("mkdir"), Err(AppError::InvalidInput(_))));
        assert!(matches!(parse_line("rename 1"), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn shell_session_builds_and_saves_tree() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        let output = run(
            &mut session,
            "mkdir Saves\nmkdir Saves\ncd 1\nmkdir Inner\nadd world\ncd ..\nls\nquit\nmkdir ignored\n",
        );

        assert!(output.contains("created Saves#1"));
        assert!(output.contains("base/Saves> "));
        assert!(output.contains("  [1] Saves/ (Saves#1)"));
        assert_eq!(session.folders().unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("worlds.dat")).unwrap(),
            "base#0:\nSaves#0:\nSaves#1:\n\tInner#0:\n"
        );
    }

    #[test]
    fn shell_reports_errors_and_continues() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        let output = run(&mut session, "cd 3\nbogus\nmkdir A\n");

        assert!(output.contains("error: Not found"));
        assert!(output.contains("error: Invalid input: unknown command 'bogus'"));
        assert_eq!(session.folders().unwrap(), 1);
    }

    #[test]
    fn shell_rm_moves_records_to_root() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        run(&mut session, "mkdir A\ncd A#0\nadd r\ncd /\nrm 0\n");

        assert_eq!(session.folders().unwrap(), 0);
        assert_eq!(session.entry(0).unwrap().name, "r");
    }

    #[test]
    fn parse_preview_wraps_inner_command() {
        assert_eq!(
            parse_line("preview rm 0").unwrap(),
            Some(Command::Preview(Box::new(Command::Remove(0))))
        );
        assert!(parse_line("preview").is_err());
        assert!(parse_line("preview quit").is_err());
        assert!(parse_line("preview preview ls").is_err());
    }

    #[test]
    fn preview_leaves_session_untouched() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();
        run(&mut session, "mkdir A\ncd 0\nadd r\ncd /\n");

        let output = run(&mut session, "preview rm 0\n");

        assert!(output.contains("base#0:\n- r [base]\n"));
        assert_eq!(session.folders().unwrap(), 1);
        assert_eq!(session.child(0).unwrap().entry_count(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("worlds.dat")).unwrap(),
            "base#0:\nA#0:\n"
        );
    }

    #[test]
    fn cd_with_path_navigates() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();
        run(&mut session, "mkdir A\ncd 0\nmkdir B\n");
        let mut out = Vec::new();
        execute(
            &mut session,
            Command::Enter("base#0/A#0/B#0".into()),
            false,
            &mut out,
        )
        .unwrap();
        assert_eq!(session.unique_path(), "base#0/A#0/B#0");
    }

    #[test]
    fn cd_prefers_child_named_like_root() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        run(&mut session, "cd base#0\n");
        assert_eq!(session.unique_path(), "base#0");

        run(&mut session, "mkdir base\ncd base#0\n");
        assert_eq!(session.unique_path(), "base#0/base#0");
    }

    #[test]
    fn cd_path_without_root_marker_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        let output = run(&mut session, "mkdir A\ncd 0\nmkdir B\ncd /\ncd A#0/B#0\n");

        assert!(output.contains("error: Invalid input"));
        assert_eq!(session.unique_path(), "base#0");
    }

    #[test]
    fn rename_then_mv_keeps_one_copy() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(dir.path(), "worlds").unwrap();

        run(&mut session, "mkdir A\ncd 0\nadd r\ncd /\nrename 0 B\nmv r base#0\n");

        assert_eq!(session.entry(0).unwrap().name, "r");
        assert_eq!(session.child(0).unwrap().entry_count(), 0);
    }
}

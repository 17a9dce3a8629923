#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Simple command: "echo hello"; empty argv is a no-op
    Exec {
        argv: Vec<String>,
    },
    // Redirection: "sort < in.txt > out.txt"
    Redirect {
        child: Box<Command>,
        input_file: Option<String>,
        output_file: Option<String>,
        append: bool,
    },
    // Pipeline: "ls | grep target"
    Pipe {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Unconditional sequence: "make; make install"
    Sequence {
        left: Box<Command>,
        right: Box<Command>,
    },
    // Detached: "sleep 10 &"
    Background {
        child: Box<Command>,
    },
}

impl Command {
    pub fn exec<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Exec {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn pipe(left: Command, right: Command) -> Self {
        Command::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn sequence(left: Command, right: Command) -> Self {
        Command::Sequence {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn background(child: Command) -> Self {
        Command::Background {
            child: Box::new(child),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Command::Exec { argv } if argv.is_empty())
    }
}

// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Implementation of ProgressPrinter structure for printing the progress of trajectory reading.

use colored::{ColoredString, Colorize};
use std::io::Write;

/// Progress of trajectory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// Trajectory reading is in progress.
    Running,
    /// Trajectory has been read completely.
    Completed,
    /// Trajectory reading failed.
    Failed,
}

/// String that can be used inside `ProgressPrinter`.
#[derive(Debug, Clone, PartialEq)]
struct ProgressMessage {
    msg: ColoredString,
}

impl ProgressMessage {
    /// Create new `ProgressMessage`.
    ///
    /// ## Panics
    /// Panics if the string is longer than 9 characters.
    fn new(string: ColoredString) -> Self {
        assert!(
            string.chars().count() <= 9,
            "`ProgressMessage` can not be longer than 9 characters."
        );

        ProgressMessage { msg: string }
    }

    /// Print formatted `ProgressMessage`.
    fn print(&self, out: &mut dyn Write, colored: bool) -> std::io::Result<()> {
        if colored {
            write!(out, "[{: ^9}]   ", self.msg)
        } else {
            write!(out, "[{: ^9}]   ", self.msg.as_ref() as &str)
        }
    }
}

/// Structure handling printing of progress of reading a trajectory file.
/// Constructed using `ProgressPrinter::new()` and associated with a
/// trajectory reader using `TrajReader::print_progress()`.
pub struct ProgressPrinter {
    /// Stream to write the progress info to.
    output: Box<dyn Write + Send>,
    /// Current status of reading. Default: ProgressStatus::Running.
    status: ProgressStatus,
    /// Frequency of printing. Print every `print_freq`th frame. Default: 100 frames.
    print_freq: usize,
    /// If true, the output will be colored. Default: true.
    colored: bool,
    /// String to be printed with the index of the frame. Default: "Frame".cyan().
    frame_msg: ColoredString,
    /// String to be printed with the current simulation time. Default: "Time".bright_purple().
    time_msg: ColoredString,
    running_msg: ProgressMessage,
    completed_msg: ProgressMessage,
    failed_msg: ProgressMessage,
    /// String terminating the progress message. Default: `\r` (carriage return).
    terminating: String,
}

impl ProgressPrinter {
    /// Create an instance of `ProgressPrinter` with default parameters.
    ///
    /// The default values of the `ProgressPrinter` parameters.
    /// - `output`: `std::io::stdout()`
    /// - `status`: `ProgressStatus::Running`
    /// - `print_freq`: `100` (progress info is printed every 100 frames read)
    /// - `colored`: `true`
    /// - `frame_msg`: `"Frame".cyan()`
    /// - `time_msg`: `"Time".bright_purple()`
    /// - `running_msg`: `"RUNNING".yellow()`
    /// - `completed_msg`: `"COMPLETED".green()`
    /// - `failed_msg`: `"FAILED!".red()`
    /// - `terminating`: `\r` (useful to set to `\n` when printing to a file)
    ///
    /// ## Example
    /// ```no_run
    /// use trjkit::prelude::*;
    /// use colored::Colorize;
    ///
    /// let printer = ProgressPrinter::new()
    ///     .with_print_freq(200)
    ///     .with_running_msg("ANALYZING".yellow())
    ///     .with_completed_msg("DONE".blue());
    ///
    /// let mut traj = DcdReader::open("trajectory.dcd", TrajOptions::default()).unwrap();
    /// let mut group = AtomGroup::new(traj.natoms());
    /// let mut reader = TrajReader::new(&mut traj, &mut group).print_progress(printer);
    ///
    /// while let Some(frame) = reader.next_frame() {
    ///     let group = frame.unwrap();
    ///     // analyze the frame
    /// }
    /// ```
    pub fn new() -> Self {
        ProgressPrinter {
            output: Box::from(std::io::stdout()),
            status: ProgressStatus::Running,
            print_freq: 100,
            colored: true,
            frame_msg: "Frame".cyan(),
            time_msg: "Time".bright_purple(),
            running_msg: ProgressMessage::new("RUNNING".yellow()),
            completed_msg: ProgressMessage::new("COMPLETED".green()),
            failed_msg: ProgressMessage::new("FAILED!".red()),
            terminating: String::from("\r"),
        }
    }

    /// Create new `ProgressPrinter` with specific `output` stream.
    pub fn with_output(mut self, stream: Box<dyn Write + Send>) -> Self {
        self.output = stream;
        self
    }

    /// Create new `ProgressPrinter` with specific value for `print_freq`.
    /// A frequency of zero is treated as one.
    pub fn with_print_freq(mut self, print_freq: usize) -> Self {
        self.print_freq = print_freq.max(1);
        self
    }

    /// Create new `ProgressPrinter` with specific value for `colored`.
    pub fn with_colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Create new `ProgressPrinter` with specific value for `frame_msg`.
    pub fn with_frame_msg(mut self, frame_msg: ColoredString) -> Self {
        self.frame_msg = frame_msg;
        self
    }

    /// Create new `ProgressPrinter` with specific value for `time_msg`.
    pub fn with_time_msg(mut self, time_msg: ColoredString) -> Self {
        self.time_msg = time_msg;
        self
    }

    /// Create new `ProgressPrinter` with specific value for `running_msg`.
    ///
    /// ## Panics
    /// Panics if the `running_msg` is longer than 9 characters.
    pub fn with_running_msg(mut self, running_msg: ColoredString) -> Self {
        self.running_msg = ProgressMessage::new(running_msg);
        self
    }

    /// Create new `ProgressPrinter` with specific value for `completed_msg`.
    ///
    /// ## Panics
    /// Panics if the `completed_msg` is longer than 9 characters.
    pub fn with_completed_msg(mut self, completed_msg: ColoredString) -> Self {
        self.completed_msg = ProgressMessage::new(completed_msg);
        self
    }

    /// Create new `ProgressPrinter` with specific value for `failed_msg`.
    ///
    /// ## Panics
    /// Panics if the `failed_msg` is longer than 9 characters.
    pub fn with_failed_msg(mut self, failed_msg: ColoredString) -> Self {
        self.failed_msg = ProgressMessage::new(failed_msg);
        self
    }

    /// Create new `ProgressPrinter` with specific value for `terminating`.
    pub fn with_terminating(mut self, string: &str) -> Self {
        self.terminating = string.to_string();
        self
    }

    /// Set new status to an already constructed `ProgressPrinter`.
    pub fn set_status(&mut self, status: ProgressStatus) {
        self.status = status;
    }

    /// Get the current status of the `ProgressPrinter`.
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    /// Print progress info about trajectory reading.
    ///
    /// While running, only every `print_freq`th frame is reported.
    /// Completion and failure are always reported and end the line.
    pub fn print(&mut self, frame_number: usize, sim_time: f32) -> std::io::Result<()> {
        if self.status == ProgressStatus::Running && frame_number % self.print_freq != 0 {
            return Ok(());
        }

        let message = match self.status {
            ProgressStatus::Running => &self.running_msg,
            ProgressStatus::Completed => &self.completed_msg,
            ProgressStatus::Failed => &self.failed_msg,
        };
        message.print(&mut self.output, self.colored)?;

        if self.colored {
            write!(
                self.output,
                "{} {:12} | {} {:12} ps{}",
                self.frame_msg, frame_number, self.time_msg, sim_time as u64, self.terminating
            )?;
        } else {
            write!(
                self.output,
                "{} {:12} | {} {:12} ps{}",
                self.frame_msg.as_ref() as &str,
                frame_number,
                self.time_msg.as_ref() as &str,
                sim_time as u64,
                self.terminating
            )?;
        }

        if self.status != ProgressStatus::Running {
            writeln!(self.output)?;
        }

        self.output.flush()
    }
}

impl Default for ProgressPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/******************************/
/*         UNIT TESTS         */
/******************************/

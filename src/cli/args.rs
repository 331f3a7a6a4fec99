use clap::Parser;
use std::path::PathBuf;

// Flags are long-only: with no short flags registered, a first positional
// such as `-v` or `-a` is read as a value.
#[derive(Parser, Debug)]
#[command(name = "certificado")]
#[command(author, version, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(about = "Render a course completion certificate into a PDF")]
#[command(after_help = "Invocation forms:\n  \
    certificado <PAYLOAD>\n      base64 of a JSON object with student_name, course_name, completion_date\n      (and optionally output_path); the PDF goes to stdout unless output_path is set\n  \
    certificado <STUDENT> <COURSE> <DATE> <LEGACY> <OUTPUT_PATH>\n      LEGACY is required for compatibility and ignored\n  \
    Put `--` before the fields if a value starts with `--`")]
pub struct Cli {
    /// Assets directory holding the template and its images
    #[arg(long, default_value = "gerador_certificado")]
    pub assets: PathBuf,

    /// Template file name inside the assets directory
    #[arg(long, default_value = "template.html")]
    pub template: String,

    /// Verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Encoded payload, or the five positional fields
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub inputs: Vec<String>,
}

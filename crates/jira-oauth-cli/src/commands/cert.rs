//! `jira-oauth cert generate` command implementation.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use jira_config::CliSettings;
use jira_oauth::provision::{
    self, CERT_FILE, CertificateSubject, KeyMaterial, PRIVATE_KEY_FILE, ProvisioningError,
};

use crate::error::CliError;
use crate::output::Output;

/// Attempts allowed per question.
const MAX_ATTEMPTS: usize = 3;

/// Key material subcommands.
#[derive(Subcommand)]
pub(crate) enum CertCommand {
    /// Generate the RSA key pair and self-signed certificate.
    Generate(GenerateArgs),
}

impl CertCommand {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Generate(args) => args.execute(),
        }
    }
}

/// Arguments for the cert generate command.
#[derive(Args)]
pub(crate) struct GenerateArgs {
    /// Directory for private.key, public.key and cert.pem (default: from config).
    #[arg(long, env = "JIRA_OAUTH_CERT_DIR")]
    cert_dir: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover jira-oauth.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl GenerateArgs {
    /// Execute the cert generate command.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, a question fails
    /// three times or generation fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let settings = CliSettings {
            cert_dir: self.cert_dir,
            ..CliSettings::default()
        };
        let config = super::load_config(self.config.as_deref(), &settings)?;
        let dir = config.oauth_resolved.cert_dir;

        output.success("Generate private / public keys for Jira");
        provision::ensure_directory(&dir)?;
        if dir.join(PRIVATE_KEY_FILE).exists() || dir.join(CERT_FILE).exists() {
            output.warning(&format!(
                "Existing key material in {} will be replaced",
                dir.display()
            ));
        }

        let stdin = io::stdin();
        let mut prompter = Prompter::new(stdin.lock(), io::stdout());
        let (subject, days) = ask_subject(&mut prompter)?;

        output.info("\nGenerating RSA-2048 key and certificate...");
        let material = KeyMaterial::generate(&subject, days)?;
        material.write_to(&dir)?;

        print_summary(&output, &dir, &material);
        Ok(())
    }
}

fn print_summary(output: &Output, dir: &Path, material: &KeyMaterial) {
    output.separator();
    output.success(&format!("All done! Keys saved in {}", dir.display()));
    output.separator();
    output.info("\nPaste this public key into the Jira application link:\n");
    output.highlight(material.public_key_pem().trim_end());
}

/// Ask every subject field, then the validity in days.
fn ask_subject<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<(CertificateSubject, u32), CliError> {
    let subject = CertificateSubject {
        country: prompter.ask("Enter the country name (eg. US): ", provision::validate_country)?,
        state: prompter.ask(
            "Enter the state or province name: ",
            provision::validate_not_empty,
        )?,
        locality: prompter.ask("Enter the locality name: ", provision::validate_not_empty)?,
        organization: prompter.ask(
            "Enter the organization name: ",
            provision::validate_not_empty,
        )?,
        organizational_unit: prompter.ask(
            "Enter the organization unit name: ",
            provision::validate_not_empty,
        )?,
        common_name: prompter.ask("Enter the common name: ", provision::validate_not_empty)?,
        email: prompter.ask("Enter the email address: ", provision::validate_email)?,
    };
    let days = prompter.ask(
        "Enter the number of days for certificate validity: ",
        provision::validate_validity_days,
    )?;
    Ok((subject, days))
}

/// Line-based question helper with a bounded number of attempts.
struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask until `validate` accepts the answer.
    ///
    /// The validator's message is shown after each rejected answer; the
    /// last rejection is returned as the error. End of input aborts.
    fn ask<T>(
        &mut self,
        question: &str,
        validate: impl Fn(&str) -> Result<T, ProvisioningError>,
    ) -> Result<T, CliError> {
        let mut last_error = None;
        for _ in 0..MAX_ATTEMPTS {
            write!(self.output, "{question}")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(CliError::Validation("input aborted".to_owned()));
            }

            match validate(line.trim()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    writeln!(self.output, "{e}")?;
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.map_or_else(
            || CliError::Validation("no answer".to_owned()),
            CliError::Provisioning,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use pretty_assertions::assert_eq;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_ask_accepts_first_valid_answer() {
        let mut p = prompter("RO\n");

        let country = p.ask("Country: ", provision::validate_country).unwrap();

        assert_eq!(country, "RO");
        assert_eq!(String::from_utf8(p.output).unwrap(), "Country: ");
    }

    #[test]
    fn test_ask_retries_with_validator_message() {
        let mut p = prompter("XX\nRO\n");

        let country = p.ask("Country: ", provision::validate_country).unwrap();

        assert_eq!(country, "RO");
        assert_eq!(
            String::from_utf8(p.output).unwrap(),
            "Country: Invalid country code\nCountry: "
        );
    }

    #[test]
    fn test_ask_fails_after_three_attempts() {
        let mut p = prompter("0\n-1\nabc\n10\n");

        let err = p
            .ask("Days: ", provision::validate_validity_days)
            .unwrap_err();

        assert!(matches!(
            err,
            CliError::Provisioning(ProvisioningError::InvalidValidity(_))
        ));
        assert_eq!(String::from_utf8(p.output).unwrap().matches("Days: ").count(), 3);
        // fourth line is never read
        assert_eq!(p.input.position(), "0\n-1\nabc\n".len() as u64);
    }

    #[test]
    fn test_ask_reprompts_excessive_validity() {
        let mut p = prompter("3000000\n3650\n");

        let days = p.ask("Days: ", provision::validate_validity_days).unwrap();

        assert_eq!(days, 3650);
        assert_eq!(
            String::from_utf8(p.output).unwrap(),
            "Days: Invalid value, enter an integer between 1 and 36500\nDays: "
        );
    }

    #[test]
    fn test_ask_end_of_input() {
        let mut p = prompter("");

        let err = p.ask("Name: ", provision::validate_not_empty).unwrap_err();

        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn test_ask_subject_full_wizard() {
        let mut p = prompter(
            "US\nCalifornia\n\nSan Francisco\nExample Inc\nEngineering\njira.example.com\nnot-an-email\nops@example.com\n365\n",
        );

        let (subject, days) = ask_subject(&mut p).unwrap();

        assert_eq!(
            subject,
            CertificateSubject {
                country: "US".to_owned(),
                state: "California".to_owned(),
                locality: "San Francisco".to_owned(),
                organization: "Example Inc".to_owned(),
                organizational_unit: "Engineering".to_owned(),
                common_name: "jira.example.com".to_owned(),
                email: "ops@example.com".to_owned(),
            }
        );
        assert_eq!(days, 365);
        let transcript = String::from_utf8(p.output).unwrap();
        assert!(transcript.contains("This value cannot be empty"));
        assert!(transcript.contains("Invalid email"));
    }
}

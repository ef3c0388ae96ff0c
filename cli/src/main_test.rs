use super::*;

#[test]
fn password_flag_or_env_wins_over_stdin() {
    let password = resolve_password(Some("from-env".into()), "from-stdin\n".as_bytes()).unwrap();
    assert_eq!(password, "from-env");
}

#[test]
fn password_falls_back_to_first_stdin_line() {
    let password = resolve_password(None, "hunter2\r\nignored\n".as_bytes()).unwrap();
    assert_eq!(password, "hunter2");
}

#[test]
fn blank_password_everywhere_is_an_error() {
    let err = resolve_password(Some(String::new()), "\n".as_bytes()).unwrap_err();
    assert!(matches!(err, CliError::MissingPassword));
    assert!(err.to_string().contains("WOLVADMIN_PASSWORD"));
}

#[test]
fn sign_in_parses_without_password_flag() {
    let cli = Cli::try_parse_from(["wolvadmin", "sign-in", "--email", "admin@wolvinvest.test"]).unwrap();
    let Command::SignIn(args) = cli.command else {
        panic!("expected sign-in");
    };
    assert_eq!(args.email, "admin@wolvinvest.test");
    assert_eq!(args.wait_secs, 10);
}

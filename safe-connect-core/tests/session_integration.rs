//! End-to-end session tests against real provider and client processes.
//!
//! Providers and the client are small `/bin/sh` scripts in a temporary
//! directory. The client executable `<home>/bin/sqlplus` is a symlink to
//! `/bin/sh` and receives its script as the "no-login flag" argument, so no
//! freshly written file is ever exec'd directly.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

#[cfg(all(test, unix))]
mod session_integration {
    use safe_connect_core::{
        ClientConfig, SafeConnectError, Session, SessionConfig, SessionState, TruncationPolicy,
    };
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let bin = dir.path().join("home").join("bin");
            fs::create_dir_all(&bin).unwrap();
            std::os::unix::fs::symlink("/bin/sh", bin.join("sqlplus")).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn home(&self) -> PathBuf {
            self.path("home")
        }

        /// Writes a script and returns the provider command that runs it.
        fn provider(&self, name: &str, body: &str) -> String {
            let script = self.path(name);
            fs::write(&script, body).unwrap();
            format!("/bin/sh {}", script.display())
        }

        /// Client that records its arguments, its home variable and its
        /// whole stdin, then exits with `code`.
        fn recording_client(&self, code: i32) -> ClientConfig {
            let body = format!(
                "printf '%s\\n' \"$*\" > '{argv}'\n\
                 printf '%s\\n' \"$ORACLE_HOME\" > '{home}'\n\
                 cat > '{stdin}'\n\
                 exit {code}\n",
                argv = self.path("client_argv").display(),
                home = self.path("client_home").display(),
                stdin = self.path("client_stdin").display(),
                code = code,
            );
            self.client_script(&body)
        }

        fn client_script(&self, body: &str) -> ClientConfig {
            let script = self.path("client.sh");
            fs::write(&script, body).unwrap();
            ClientConfig {
                no_login_flag: script.display().to_string(),
                extra_args: vec!["-S".to_string()],
                ..ClientConfig::default()
            }
        }

        fn config(&self, username: String, password: String, client: ClientConfig) -> SessionConfig {
            SessionConfig::new("{{username}}/\"{{password}}\"@DB", self.home(), username, password)
                .with_client(client)
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.path(name)).unwrap()
        }

        fn exists(&self, name: &str) -> bool {
            self.path(name).exists()
        }
    }

    #[tokio::test]
    async fn test_session_integration_full_pipeline() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "printf 'alice\\n'\n"),
            fixture.provider("pass.sh", "printf 's3cret!'\n"),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"select 1 from dual;\nexit\n";
        let outcome = session.run(&mut input).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.final_state, SessionState::Done);
        assert_eq!(
            fixture.read("client_stdin"),
            "set define off;\n\
             connect alice/\"s3cret!\"@DB\n\
             set define on;\n\
             select 1 from dual;\nexit\n"
        );
        assert!(fixture.read("client_argv").trim_end().ends_with("-S"));
        assert_eq!(
            fixture.read("client_home").trim_end(),
            fixture.home().display().to_string()
        );
    }

    #[tokio::test]
    async fn test_session_integration_client_status_propagates() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "echo scott\n"),
            fixture.provider("pass.sh", "echo tiger\n"),
            fixture.recording_client(3),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let outcome = session.run(&mut input).await.unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.final_state, SessionState::Done);
    }

    #[tokio::test]
    async fn test_session_integration_password_failure_stops_before_client() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "echo scott\n"),
            fixture.provider("pass.sh", "echo 'vault sealed' >&2\nexit 7\n"),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let err = session.run(&mut input).await.unwrap_err();

        assert!(matches!(err, SafeConnectError::ProviderFailed { code: 7, .. }));
        assert_eq!(err.exit_code(), 7);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!fixture.exists("client_stdin"), "client must not be spawned");
    }

    #[tokio::test]
    async fn test_session_integration_username_failure_skips_password() {
        let fixture = Fixture::new();
        let marker = fixture.path("password_ran");
        let config = fixture.config(
            fixture.provider("user.sh", "exit 5\n"),
            fixture.provider(
                "pass.sh",
                &format!("touch '{}'\necho tiger\n", marker.display()),
            ),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let err = session.run(&mut input).await.unwrap_err();

        assert_eq!(err.exit_code(), 5);
        assert!(!marker.exists(), "password provider must not run");
        assert!(!fixture.exists("client_stdin"));
    }

    #[tokio::test]
    async fn test_session_integration_secret_is_not_reexpanded() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "echo '{{password}}'\n"),
            fixture.provider("pass.sh", "echo 'p&w'\n"),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        session.run(&mut input).await.unwrap();

        assert!(
            fixture
                .read("client_stdin")
                .contains("connect {{password}}/\"p&w\"@DB\n")
        );
    }

    #[tokio::test]
    async fn test_session_integration_oversized_secret_truncated() {
        let fixture = Fixture::new();
        let config = fixture
            .config(
                fixture.provider("user.sh", "echo abcdefghijkl\n"),
                fixture.provider("pass.sh", "echo pw\n"),
                fixture.recording_client(0),
            )
            .with_secret_capacity(8);

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        session.run(&mut input).await.unwrap();

        assert!(
            fixture
                .read("client_stdin")
                .contains("connect abcdefgh/\"pw\"@DB\n")
        );
    }

    #[tokio::test]
    async fn test_session_integration_oversized_secret_rejected() {
        let fixture = Fixture::new();
        let config = fixture
            .config(
                fixture.provider("user.sh", "echo abcdefghijkl\n"),
                fixture.provider("pass.sh", "echo pw\n"),
                fixture.recording_client(0),
            )
            .with_secret_capacity(8)
            .with_truncation(TruncationPolicy::Reject);

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let err = session.run(&mut input).await.unwrap_err();

        assert!(matches!(
            err,
            SafeConnectError::SecretTooLong { capacity: 8, .. }
        ));
        assert!(!fixture.exists("client_stdin"));
    }

    #[tokio::test]
    async fn test_session_integration_empty_provider_output() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "true\n"),
            fixture.provider("pass.sh", "echo pw\n"),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let err = session.run(&mut input).await.unwrap_err();

        assert!(matches!(err, SafeConnectError::NoOutput { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_session_integration_client_exit_ends_relay() {
        let fixture = Fixture::new();
        let client = fixture.client_script(&format!(
            "read -r a\nread -r b\nread -r c\nprintf '%s\\n' \"$b\" > '{}'\nexit 0\n",
            fixture.path("connect_line").display()
        ));
        let config = fixture.config(
            fixture.provider("user.sh", "echo scott\n"),
            fixture.provider("pass.sh", "echo tiger\n"),
            client,
        );

        // Input that never reaches end-of-stream while the writer is alive.
        let (mut input, _writer) = tokio::io::duplex(64);

        let mut session = Session::new(&config).unwrap();
        let outcome = session.run(&mut input).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.final_state, SessionState::Done);
        assert_eq!(
            fixture.read("connect_line"),
            "connect scott/\"tiger\"@DB\n"
        );
    }

    #[tokio::test]
    async fn test_session_integration_client_failure_aborts_blocked_relay() {
        let fixture = Fixture::new();
        let client = fixture.client_script("read -r a\nexit 4\n");
        let config = fixture.config(
            fixture.provider("user.sh", "echo scott\n"),
            fixture.provider("pass.sh", "echo tiger\n"),
            client,
        );

        let (mut input, _writer) = tokio::io::duplex(64);

        let mut session = Session::new(&config).unwrap();
        let exit_code = match session.run(&mut input).await {
            Ok(outcome) => outcome.exit_code,
            Err(e) => e.exit_code(),
        };

        assert_eq!(exit_code, 4);
    }

    #[tokio::test]
    async fn test_session_integration_provider_background_process() {
        let fixture = Fixture::new();
        let config = fixture.config(
            fixture.provider("user.sh", "echo scott\nsleep 30 &\nexit 0\n"),
            fixture.provider("pass.sh", "echo tiger\n"),
            fixture.recording_client(0),
        );

        let started = std::time::Instant::now();
        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let outcome = tokio::time::timeout(Duration::from_secs(20), session.run(&mut input))
            .await
            .expect("session waited for the provider's background process")
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(
            fixture
                .read("client_stdin")
                .contains("connect scott/\"tiger\"@DB\n")
        );
    }

    #[tokio::test]
    async fn test_session_integration_missing_provider_program() {
        let fixture = Fixture::new();
        let config = fixture.config(
            "/nonexistent/bin/get_username".to_string(),
            fixture.provider("pass.sh", "echo tiger\n"),
            fixture.recording_client(0),
        );

        let mut session = Session::new(&config).unwrap();
        let mut input: &[u8] = b"";
        let err = session.run(&mut input).await.unwrap_err();

        assert!(matches!(err, SafeConnectError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/bin/get_username"));
        assert_eq!(err.exit_code(), 1);
    }
}

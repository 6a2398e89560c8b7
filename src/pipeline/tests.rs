//! Pipeline Module Tests
//!
//! Unit tests for the token hand-off plumbing.
//!
//! ## Test Scopes
//! - **Token**: Serialization, property bag access, audit-log append.
//! - **Pipe**: The take/put protocol, claim exclusivity, error routing.
//! - **Drivers**: The filter state machine and the monitor pass.
//! - **Topology**: Name resolution and the diagnostic snapshot.

#[cfg(test)]
mod tests {
    use crate::pipeline::{
        dump_token, load_token, FilterDriver, LogLevel, MonitorDriver, MonitorStage, Outcome,
        Pipe, Pipeline, Readiness, Stage, Token,
    };
    use anyhow::Result;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_token(bucket: &Path, barcode: &str) -> Token {
        let token = Token::new(barcode);
        dump_token(&token, &bucket.join(format!("{barcode}.json"))).unwrap();
        token
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // ============================================================
    // TEST 1: Token - Properties and Audit Log
    // ============================================================

    #[test]
    fn test_token_round_trip_preserves_props_and_log() {
        // ARRANGE
        let dir = tempdir().unwrap();
        let mut token = Token::new("39002012345678");
        token.set("processing_bucket", "/var/tmp/processing");
        token.set("attempts", 3);
        token.append_log(Some("requester"), LogLevel::Info, "requested");

        // ACT
        let path = dir.path().join("39002012345678.json");
        dump_token(&token, &path).unwrap();
        let loaded = load_token(&path).unwrap();

        // ASSERT
        assert_eq!(loaded.barcode, "39002012345678");
        assert_eq!(
            loaded.get("processing_bucket").and_then(|v| v.as_str()),
            Some("/var/tmp/processing")
        );
        assert_eq!(loaded.get("attempts").and_then(|v| v.as_i64()), Some(3));
        assert_eq!(loaded.log.len(), 1);
        assert_eq!(loaded.log[0].stage.as_deref(), Some("requester"));
        assert_eq!(loaded.log[0].level, LogLevel::Info);
    }

    #[test]
    fn test_dump_token_leaves_no_temp_file() {
        // ARRANGE
        let dir = tempdir().unwrap();
        let token = Token::new("b1");

        // ACT
        dump_token(&token, &dir.path().join("b1.json")).unwrap();

        // ASSERT
        assert_eq!(file_names(dir.path()), vec!["b1.json"]);
    }

    // ============================================================
    // TEST 2: Pipe - Take/Put Protocol
    // ============================================================

    #[test]
    fn test_take_claims_and_put_forwards() {
        // ARRANGE: one waiting token
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let mut pipe = Pipe::new(input.path(), output.path());

        // ACT: take
        let token = pipe.take().unwrap().expect("token should be waiting");

        // ASSERT: claim renamed the file, nothing is waiting anymore
        assert_eq!(token.barcode, "b1");
        assert_eq!(pipe.held(), Some("b1"));
        assert_eq!(file_names(input.path()), vec!["b1.bak"]);

        // ACT: put
        pipe.put(&token, false).unwrap();

        // ASSERT: the input is clean and the output has exactly the token
        assert!(file_names(input.path()).is_empty());
        assert_eq!(file_names(output.path()), vec!["b1.json"]);
        assert_eq!(pipe.held(), None);
    }

    #[test]
    fn test_take_returns_none_on_empty_bucket() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let mut pipe = Pipe::new(input.path(), output.path());

        assert!(pipe.take().unwrap().is_none());
    }

    #[test]
    fn test_take_refuses_second_claim_while_holding() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        write_token(input.path(), "b2");
        let mut pipe = Pipe::new(input.path(), output.path());

        // ACT
        let first = pipe.take().unwrap();
        let second = pipe.take().unwrap();

        // ASSERT: at most one token in flight per pipe
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(file_names(input.path()), vec!["b1.bak", "b2.json"]);
    }

    #[test]
    fn test_two_pipes_cannot_claim_the_same_token() {
        // ARRANGE: two readers over the same bucket
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let mut first = Pipe::new(input.path(), output.path());
        let mut second = Pipe::new(input.path(), output.path());

        // ACT: both scan; only the first rename can succeed
        let claimed_by_first = first.take().unwrap();
        let claimed_by_second = second.take().unwrap();

        // ASSERT
        assert!(claimed_by_first.is_some());
        assert!(claimed_by_second.is_none());
    }

    #[test]
    fn test_take_is_deterministic_by_barcode_order() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b2");
        write_token(input.path(), "b1");
        let mut pipe = Pipe::new(input.path(), output.path());

        let token = pipe.take().unwrap().unwrap();

        assert_eq!(token.barcode, "b1");
    }

    #[test]
    fn test_take_named_claims_specific_token() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        write_token(input.path(), "b2");
        let mut pipe = Pipe::new(input.path(), output.path());

        let token = pipe.take_named("b2").unwrap().unwrap();

        assert_eq!(token.barcode, "b2");
        assert!(pipe.take_named("missing").is_ok());
    }

    #[test]
    fn test_put_as_error_lands_in_input_bucket() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let mut pipe = Pipe::new(input.path(), output.path());
        let token = pipe.take().unwrap().unwrap();

        // ACT
        pipe.put(&token, true).unwrap();

        // ASSERT: .err next to where the token came from, output untouched
        assert_eq!(file_names(input.path()), vec!["b1.err"]);
        assert!(file_names(output.path()).is_empty());
    }

    #[test]
    fn test_put_back_requeues_token() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let mut pipe = Pipe::new(input.path(), output.path());
        let mut token = pipe.take().unwrap().unwrap();
        token.append_log(Some("monitor"), LogLevel::Info, "conversion pending");

        // ACT
        pipe.put_back(&token, false).unwrap();

        // ASSERT: back to waiting, with the appended log persisted
        assert_eq!(file_names(input.path()), vec!["b1.json"]);
        let reloaded = load_token(&input.path().join("b1.json")).unwrap();
        assert_eq!(reloaded.log.len(), 1);
        assert_eq!(pipe.held(), None);
    }

    #[test]
    fn test_failed_put_releases_claim() {
        // ARRANGE: the output bucket does not exist, so the commit write
        // must fail
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let missing = output.path().join("missing");
        write_token(input.path(), "b1");
        write_token(input.path(), "b2");
        let mut pipe = Pipe::new(input.path(), &missing);

        // ACT
        let token = pipe.take().unwrap().unwrap();
        let result = pipe.put(&token, false);

        // ASSERT: the claim is released, b1 stays stranded as .bak, and the
        // pipe can still claim the next waiting token
        assert!(result.is_err());
        assert_eq!(pipe.held(), None);
        assert_eq!(file_names(input.path()), vec!["b1.bak", "b2.json"]);
        let next = pipe.take().unwrap().unwrap();
        assert_eq!(next.barcode, "b2");
    }

    #[test]
    fn test_put_without_claim_is_an_error() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let mut pipe = Pipe::new(input.path(), output.path());

        let result = pipe.put(&Token::new("b1"), false);

        assert!(result.is_err());
    }

    #[test]
    fn test_put_rejects_mismatched_barcode() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let mut pipe = Pipe::new(input.path(), output.path());
        pipe.take().unwrap().unwrap();

        let result = pipe.put(&Token::new("b2"), false);

        assert!(result.is_err());
    }

    // ============================================================
    // TEST 3: FilterDriver - Stage State Machine
    // ============================================================

    struct FixedStage {
        verdict: Result<bool, String>,
        valid: bool,
    }

    impl Stage for FixedStage {
        fn name(&self) -> &str {
            "fixed"
        }

        fn validate(&self, token: &mut Token) -> bool {
            if !self.valid {
                token.append_log(Some("fixed"), LogLevel::Error, "invalid token");
            }
            self.valid
        }

        async fn process(&self, _token: &mut Token) -> Result<bool> {
            match &self.verdict {
                Ok(flag) => Ok(*flag),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        }
    }

    #[tokio::test]
    async fn test_driver_idles_on_empty_bucket() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(pipe, FixedStage { verdict: Ok(true), valid: true });

        let outcome = driver.run_once().await.unwrap();

        assert_eq!(outcome, Outcome::Idle);
    }

    #[tokio::test]
    async fn test_driver_forwards_successful_token() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(pipe, FixedStage { verdict: Ok(true), valid: true });

        // ACT
        let outcome = driver.run_once().await.unwrap();

        // ASSERT: forwarded with a success entry in the audit log, and no
        // trace of the barcode left in the input bucket
        assert_eq!(outcome, Outcome::Handled);
        assert!(file_names(input.path()).is_empty());
        let forwarded = load_token(&output.path().join("b1.json")).unwrap();
        assert_eq!(forwarded.log.len(), 1);
        assert_eq!(forwarded.log[0].level, LogLevel::Info);
    }

    #[tokio::test]
    async fn test_driver_fails_invalid_token_without_processing() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(pipe, FixedStage { verdict: Ok(true), valid: false });

        // ACT
        let outcome = driver.run_once().await.unwrap();

        // ASSERT
        assert_eq!(outcome, Outcome::HandledWithError);
        assert_eq!(file_names(input.path()), vec!["b1.err"]);
        assert!(file_names(output.path()).is_empty());
    }

    #[tokio::test]
    async fn test_driver_routes_reported_failure_to_error_file() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(pipe, FixedStage { verdict: Ok(false), valid: true });

        // ACT
        let outcome = driver.run_once().await.unwrap();

        // ASSERT: WARNING entry, token parked as .err
        assert_eq!(outcome, Outcome::HandledWithError);
        let failed = load_token(&input.path().join("b1.err")).unwrap();
        assert_eq!(failed.log.last().unwrap().level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn test_driver_records_stage_error_on_token() {
        // ARRANGE
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(
            pipe,
            FixedStage { verdict: Err("conversion service unreachable".to_string()), valid: true },
        );

        // ACT
        let outcome = driver.run_once().await.unwrap();

        // ASSERT: the error text lands in the audit log, not in a panic;
        // only the .err file remains for the barcode
        assert_eq!(outcome, Outcome::HandledWithError);
        assert_eq!(file_names(input.path()), vec!["b1.err"]);
        let failed = load_token(&input.path().join("b1.err")).unwrap();
        let last = failed.log.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.contains("conversion service unreachable"));
    }

    #[tokio::test]
    async fn test_driver_keeps_working_after_failed_commit() {
        // ARRANGE: two waiting tokens and an output bucket that does not
        // exist yet
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let missing = output.path().join("missing");
        write_token(input.path(), "b1");
        write_token(input.path(), "b2");
        let pipe = Pipe::new(input.path(), &missing);
        let mut driver = FilterDriver::new(pipe, FixedStage { verdict: Ok(true), valid: true });

        // ACT: the first iteration fails on the commit write
        let first = driver.run_once().await;
        assert!(first.is_err());

        // ASSERT: once the bucket exists the driver handles the next token
        // instead of idling forever
        std::fs::create_dir_all(&missing).unwrap();
        let outcome = driver.run_once().await.unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(file_names(&missing), vec!["b2.json"]);
    }

    struct SilentlyInvalid;

    impl Stage for SilentlyInvalid {
        fn name(&self) -> &str {
            "silent"
        }

        fn validate(&self, _token: &mut Token) -> bool {
            false
        }

        async fn process(&self, _token: &mut Token) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_driver_explains_validation_failure_on_err_file() {
        // ARRANGE: a stage that rejects tokens without logging anything
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "b1");
        let pipe = Pipe::new(input.path(), output.path());
        let mut driver = FilterDriver::new(pipe, SilentlyInvalid);

        // ACT
        let outcome = driver.run_once().await.unwrap();

        // ASSERT: the .err file still carries an ERROR entry from the driver
        assert_eq!(outcome, Outcome::HandledWithError);
        let failed = load_token(&input.path().join("b1.err")).unwrap();
        assert_eq!(failed.log.len(), 1);
        assert_eq!(failed.log[0].level, LogLevel::Error);
        assert!(failed.log[0].message.contains("Validation failed"));
        assert_eq!(failed.log[0].stage.as_deref(), Some("silent"));
    }

    // ============================================================
    // TEST 4: MonitorDriver - Snapshot Pass
    // ============================================================

    struct ReadyList {
        ready: Vec<String>,
        pending: Vec<String>,
    }

    impl MonitorStage for ReadyList {
        fn name(&self) -> &str {
            "ready-list"
        }

        async fn assess(&self, token: &Token) -> Result<Readiness> {
            if self.ready.contains(&token.barcode) {
                Ok(Readiness::Ready)
            } else if self.pending.contains(&token.barcode) {
                Ok(Readiness::Pending)
            } else {
                anyhow::bail!("{} is neither pending nor converted", token.barcode)
            }
        }
    }

    #[tokio::test]
    async fn test_monitor_pass_partitions_tokens() {
        // ARRANGE: one ready, one pending, one unknown
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "ready1");
        write_token(input.path(), "pending1");
        write_token(input.path(), "unknown1");
        let pipe = Pipe::new(input.path(), output.path());
        let stage = ReadyList {
            ready: vec!["ready1".to_string()],
            pending: vec!["pending1".to_string()],
        };
        let mut driver = MonitorDriver::new(pipe, stage);

        // ACT
        let forwarded = driver.run_pass().await.unwrap();

        // ASSERT: ready moved on, pending re-queued, unknown failed
        assert_eq!(forwarded, 1);
        assert_eq!(file_names(output.path()), vec!["ready1.json"]);
        assert_eq!(file_names(input.path()), vec!["pending1.json", "unknown1.err"]);
    }

    #[tokio::test]
    async fn test_monitor_pass_attempts_each_token_once() {
        // ARRANGE: everything pending
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_token(input.path(), "p1");
        write_token(input.path(), "p2");
        let pipe = Pipe::new(input.path(), output.path());
        let stage = ReadyList {
            ready: vec![],
            pending: vec!["p1".to_string(), "p2".to_string()],
        };
        let mut driver = MonitorDriver::new(pipe, stage);

        // ACT: a full pass terminates even though nothing is ready
        let forwarded = driver.run_pass().await.unwrap();

        // ASSERT
        assert_eq!(forwarded, 0);
        assert_eq!(file_names(input.path()), vec!["p1.json", "p2.json"]);
    }

    // ============================================================
    // TEST 5: Pipeline - Topology and Snapshot
    // ============================================================

    #[test]
    fn test_unknown_bucket_name_errors() {
        let pipeline = Pipeline::new(vec![]);

        let result = pipeline.bucket("requested");

        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_counts_by_extension() {
        // ARRANGE: one file of each kind in a single bucket
        let dir = tempdir().unwrap();
        write_token(dir.path(), "w1");
        std::fs::write(dir.path().join("p1.bak"), "{}").unwrap();
        std::fs::write(dir.path().join("e1.err"), "{}").unwrap();
        let pipeline = Pipeline::new(vec![("requested".to_string(), dir.path().to_path_buf())]);

        // ACT
        let report = pipeline.snapshot().unwrap();

        // ASSERT
        let counts = &report["requested"];
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.in_process, 1);
        assert_eq!(counts.errored, 1);

        // A snapshot never mutates the bucket.
        assert_eq!(file_names(dir.path()).len(), 3);
    }
}

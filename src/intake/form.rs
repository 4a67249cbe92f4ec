// The questionnaire in the terminal.

use likert_survey::session::SessionId;

use crate::intake::*;

/// Everything the form needs besides the respondent.
pub struct FormContext<'a> {
    pub title: String,
    pub catalog: &'a Catalog,
    pub rules: SurveyRules,
    pub store: &'a dyn RowStore,
    /// Seconds since the epoch, for session expiry.
    pub now: fn() -> u64,
    /// The timestamp written in the exported rows.
    pub timestamp: fn() -> String,
}

/// Who is filling in the form.
pub struct FormStart {
    pub organization: String,
    /// Asked for when missing.
    pub respondent: Option<String>,
    pub date: String,
}

/// Reads one line without its line ending. `None` when the input is closed.
fn read_line<R: BufRead>(input: &mut R) -> IntakeResult<Option<String>> {
    let mut buf = String::new();
    let n = input.read_line(&mut buf).context(TerminalSnafu)?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.trim().to_string()))
    }
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> IntakeResult<Option<String>> {
    write!(output, "{}", prompt).context(TerminalSnafu)?;
    output.flush().context(TerminalSnafu)?;
    read_line(input)
}

/// A closed input always answers no.
fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default: bool,
) -> IntakeResult<bool> {
    match ask(input, output, prompt)? {
        None => Ok(false),
        Some(s) if s.is_empty() => Ok(default),
        Some(s) => Ok(matches!(s.to_lowercase().as_str(), "y" | "yes")),
    }
}

fn render_instructions<W: Write>(
    output: &mut W,
    title: &str,
    organization: &str,
) -> std::io::Result<()> {
    writeln!(output, "{}", title)?;
    writeln!(output, "{}", "=".repeat(title.chars().count()))?;
    writeln!(output, "Organization: {}", organization)?;
    writeln!(output)?;
    writeln!(
        output,
        "Rate each statement from {} to {}, or type {} when it does not apply:",
        SCALE_MIN, SCALE_MAX, NOT_APPLICABLE
    )?;
    writeln!(
        output,
        "  1 Strongly disagree  2 Disagree  3 Neutral  4 Agree  5 Strongly agree"
    )?;
    writeln!(output, "Statements marked (R) are scored in reverse.")?;
    writeln!(output, "Press enter to keep the answer shown in brackets.")?;
    Ok(())
}

/// Goes through the whole catalog once. Returns false if the input was closed before the end.
fn collect_batch<R: BufRead, W: Write>(
    catalog: &Catalog,
    response: &mut Response,
    input: &mut R,
    output: &mut W,
) -> IntakeResult<bool> {
    for block in catalog.blocks() {
        writeln!(output, "\n-- {} --", block).context(TerminalSnafu)?;
        for item in catalog.block_items(&block) {
            let marker = if item.reversed { "(R) " } else { "" };
            let current = response
                .get(&item.id)
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            let prompt = format!("{} {}{} [{}]: ", item.id, marker, item.text, current);
            loop {
                let line = match ask(input, output, &prompt)? {
                    Some(l) => l,
                    None => return Ok(false),
                };
                if line.is_empty() {
                    break;
                }
                match Answer::parse(&line) {
                    Ok(answer) => {
                        debug!("collect_batch: {} -> {}", item.id, answer);
                        response.set(&item.id, answer);
                        break;
                    }
                    Err(e) => {
                        writeln!(output, "  {}", e).context(TerminalSnafu)?;
                    }
                }
            }
        }
    }
    Ok(true)
}

/// The answers as `id,answer` lines, readable again by `intake score`.
fn render_kept_answers<W: Write>(
    output: &mut W,
    catalog: &Catalog,
    response: &Response,
) -> std::io::Result<()> {
    writeln!(output, "Your answers were not recorded. Keep them to submit later:")?;
    writeln!(output, "id,answer")?;
    for item in catalog.items() {
        if let Some(a) = response.get(&item.id) {
            writeln!(output, "{},{}", item.id, a)?;
        }
    }
    Ok(())
}

/// The mean scores, overall and per block.
pub fn render_results<W: Write>(
    output: &mut W,
    summary: &ScoreSummary,
    gate: &GateStatus,
) -> std::io::Result<()> {
    writeln!(
        output,
        "Overall mean: {:.2} ({})",
        summary.overall_mean,
        gate.progress()
    )?;
    if summary.blocks.is_empty() {
        writeln!(output, "  No answer on the scale.")?;
    }
    for b in summary.blocks.iter() {
        writeln!(output, "  {:<32} {:.2}", b.block, b.mean)?;
    }
    if !summary.blocks.is_empty() {
        writeln!(output, "Comparison by block:")?;
    }
    // Blocks come ordered by increasing mean.
    for b in summary.blocks.iter() {
        writeln!(
            output,
            "  {:<32} {:<w$} {:.2}",
            b.block,
            bar(b.mean),
            b.mean,
            w = BAR_WIDTH
        )?;
    }
    Ok(())
}

/// Width of the bar of a mean equal to the top of the scale.
const BAR_WIDTH: usize = 20;

fn bar(mean: f64) -> String {
    let len = (mean / SCALE_MAX as f64 * BAR_WIDTH as f64).round();
    "#".repeat(len.clamp(0.0, BAR_WIDTH as f64) as usize)
}

/// The live session of the respondent. An idle session continues under a new id with its answers.
fn resume<'s, W: Write>(
    sessions: &'s mut SessionStore,
    sid: &mut SessionId,
    now: u64,
    output: &mut W,
) -> IntakeResult<&'s mut Session> {
    let renewed = match sessions.renew(sid, now) {
        Some(r) => r,
        None => whatever!("The session {} is gone", sid),
    };
    if renewed != *sid {
        writeln!(output, "\nYour session had expired. Your answers were kept.")
            .context(TerminalSnafu)?;
        *sid = renewed;
    }
    match sessions.get_mut(sid, now) {
        Ok(s) => Ok(s),
        Err(e) => whatever!("The session {} is gone: {}", sid, e),
    }
}

/// Runs one render and submit cycle.
///
/// A refused or failed submission goes back to the respondent, who can keep
/// answering or try again. Nothing is lost until they give up.
pub fn run_form<R: BufRead, W: Write>(
    ctx: &FormContext,
    start: FormStart,
    input: &mut R,
    output: &mut W,
) -> IntakeResult<()> {
    let mut sessions = SessionStore::new(ctx.rules.session_ttl_secs);
    let mut sid: SessionId = sessions
        .open(None, &start.organization, (ctx.now)())
        .id
        .clone();
    render_instructions(output, &ctx.title, &start.organization).context(TerminalSnafu)?;

    let respondent = match start.respondent {
        Some(r) => r,
        None => match ask(input, output, "\nYour name: ")? {
            Some(r) => r,
            None => return Ok(()),
        },
    };
    {
        let session = resume(&mut sessions, &mut sid, (ctx.now)(), output)?;
        session.identity.respondent = respondent;
        session.identity.date = start.date;
    }

    loop {
        let session = resume(&mut sessions, &mut sid, (ctx.now)(), output)?;
        if !collect_batch(ctx.catalog, &mut session.responses, input, output)? {
            info!("run_form: input closed, session {} not submitted", sid);
            writeln!(output).context(TerminalSnafu)?;
            render_kept_answers(output, ctx.catalog, &session.responses)
                .context(TerminalSnafu)?;
            return Ok(());
        }
        let current = session.observations.clone().unwrap_or_default();
        match ask(
            input,
            output,
            &format!("\nObservations (optional) [{}]: ", current),
        )? {
            Some(o) if !o.is_empty() => session.observations = Some(o),
            _ => {}
        }

        let status = gate_status(ctx.catalog, &session.responses, ctx.rules.gate);
        writeln!(output, "\n{}", status.progress()).context(TerminalSnafu)?;
        if status.answered == 0 || !status.open {
            if status.answered == 0 {
                writeln!(output, "No responses were filled in.").context(TerminalSnafu)?;
            } else {
                writeln!(
                    output,
                    "At least half of the statements need a rating from {} to {} before submitting.",
                    SCALE_MIN, SCALE_MAX
                )
                .context(TerminalSnafu)?;
            }
            if confirm(input, output, "Continue answering? [Y/n] ", true)? {
                continue;
            }
            render_kept_answers(output, ctx.catalog, &session.responses)
                .context(TerminalSnafu)?;
            return Ok(());
        }

        if !confirm(input, output, "Submit your answers? [y/N] ", false)? {
            if confirm(input, output, "Review your answers? [Y/n] ", true)? {
                continue;
            }
            render_kept_answers(output, ctx.catalog, &session.responses)
                .context(TerminalSnafu)?;
            return Ok(());
        }

        loop {
            match submit_session(
                ctx.catalog,
                &ctx.rules,
                session,
                ctx.store,
                &(ctx.timestamp)(),
            ) {
                Ok(summary) => {
                    writeln!(output, "\nThank you, your answers were recorded.")
                        .context(TerminalSnafu)?;
                    render_results(output, &summary, &status).context(TerminalSnafu)?;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Submission => {
                    warn!("run_form: submission of session {} failed: {}", sid, e);
                    writeln!(output, "Could not submit: {}", e).context(TerminalSnafu)?;
                    if !confirm(input, output, "Try again? [Y/n] ", true)? {
                        render_kept_answers(output, ctx.catalog, &session.responses)
                            .context(TerminalSnafu)?;
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::store::{MemoryStore, StoreResult};
    use likert_survey::export::ExportRow;
    use std::cell::Cell;
    use std::io::Cursor;

    fn fixed_now() -> u64 {
        1_700_000_000
    }

    fn fixed_timestamp() -> String {
        "2026-10-19T10:00:00".to_string()
    }

    fn run(catalog: &Catalog, store: &dyn RowStore, script: &str) -> (IntakeResult<()>, String) {
        run_with(
            catalog,
            store,
            SurveyRules::new("Open access"),
            fixed_now,
            script,
        )
    }

    fn run_with(
        catalog: &Catalog,
        store: &dyn RowStore,
        rules: SurveyRules,
        now: fn() -> u64,
        script: &str,
    ) -> (IntakeResult<()>, String) {
        let ctx = FormContext {
            title: "Safety climate".to_string(),
            catalog,
            rules,
            store,
            now,
            timestamp: fixed_timestamp,
        };
        let start = FormStart {
            organization: "Acme".to_string(),
            respondent: None,
            date: "19/10/2026".to_string(),
        };
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output: Vec<u8> = Vec::new();
        let res = run_form(&ctx, start, &mut input, &mut output);
        (res, String::from_utf8(output).unwrap())
    }

    #[test]
    fn fill_and_submit() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        // Name, ten answers, observations, submit.
        let script = "Jo\n4\n4\n2\n2\nN/A\n\n\n\n1\n5\nAll good\ny\n";
        let (res, out) = run(&catalog, &store, script);
        assert!(res.is_ok());
        assert!(out.contains("Safety climate"));
        assert!(out.contains("(R)"));
        assert!(out.contains("6/10 valid"));
        assert!(out.contains("your answers were recorded"));
        let rows = store.rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][0].to_string(), "2026-10-19T10:00:00");
        assert_eq!(rows[0][1].to_string(), "Jo");
        assert_eq!(rows[0][3].to_string(), "Acme");
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        let script = "Jo\n7\nabc\n4\n4\n4\n4\n4\n4\n4\n4\n4\n4\n\ny\n";
        let (res, out) = run(&catalog, &store, script);
        assert!(res.is_ok());
        assert_eq!(out.matches("invalid answer").count(), 2);
        assert_eq!(store.rows().len(), 10);
    }

    #[test]
    fn gate_sends_back_to_the_questions() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        // First pass: two answers only. Second pass keeps them and adds three.
        let first = "Jo\n4\n4\n\n\n\n\n\n\n\n\n\n";
        let second = "y\n\n\n3\n3\n3\n\n\n\n\n\n\ny\n";
        let (res, out) = run(&catalog, &store, &format!("{}{}", first, second));
        assert!(res.is_ok());
        assert!(out.contains("2/10 valid"));
        assert!(out.contains("5/10 valid"));
        assert_eq!(store.rows().len(), 10);
    }

    thread_local! {
        static CLOCK_CALLS: Cell<u64> = Cell::new(0);
    }

    // Two hours pass after the third reading.
    fn slow_clock() -> u64 {
        CLOCK_CALLS.with(|c| {
            c.set(c.get() + 1);
            if c.get() <= 3 {
                0
            } else {
                7200
            }
        })
    }

    #[test]
    fn idle_session_keeps_the_answers() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        let first = "Jo\n4\n4\n\n\n\n\n\n\n\n\n\n";
        let second = "y\n\n\n3\n3\n3\n\n\n\n\n\n\ny\n";
        let (res, out) = run_with(
            &catalog,
            &store,
            SurveyRules::new("Open access"),
            slow_clock,
            &format!("{}{}", first, second),
        );
        assert!(res.is_ok());
        assert!(out.contains("Your session had expired. Your answers were kept."));
        assert!(out.contains("RE01 The rewards and benefits policy is fair and clear. [4]"));
        assert!(out.contains("5/10 valid"));
        let rows = store.rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][1].to_string(), "Jo");
    }

    #[test]
    fn nothing_answered_with_an_open_gate() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        let mut rules = SurveyRules::new("Open access");
        rules.gate = GateMode::Open;
        let script = "Jo\n\n\n\n\n\n\n\n\n\n\n\nn\n";
        let (res, out) = run_with(&catalog, &store, rules, fixed_now, script);
        assert!(res.is_ok());
        assert!(out.contains("No responses were filled in."));
        assert!(!out.contains("At least half"));
        assert!(store.rows().is_empty());
    }

    #[test]
    fn closed_input_keeps_the_answers() {
        let catalog = Catalog::builtin();
        let store = MemoryStore::default();
        let (res, out) = run(&catalog, &store, "Jo\n4\nN/A\n");
        assert!(res.is_ok());
        assert!(out.contains("id,answer\nRE01,4\nRE02,N/A\n"));
        assert!(store.rows().is_empty());
    }

    struct FlakyStore {
        failures: Cell<usize>,
        inner: MemoryStore,
    }

    impl RowStore for FlakyStore {
        fn describe(&self) -> String {
            "flaky".to_string()
        }
        fn probe(&self) -> StoreResult<()> {
            Ok(())
        }
        fn append_rows(&self, rows: &[ExportRow]) -> StoreResult<usize> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(StoreError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.inner.append_rows(rows)
        }
    }

    #[test]
    fn failed_submission_can_be_retried() {
        let catalog = Catalog::builtin();
        let store = FlakyStore {
            failures: Cell::new(1),
            inner: MemoryStore::default(),
        };
        let script = "Jo\n4\n4\n4\n4\n4\n\n\n\n\n\n\ny\ny\n";
        let (res, out) = run(&catalog, &store, script);
        assert!(res.is_ok());
        assert!(out.contains("Could not submit"));
        assert_eq!(store.inner.rows().len(), 10);
    }

    #[test]
    fn giving_up_after_a_failure() {
        let catalog = Catalog::builtin();
        let store = FlakyStore {
            failures: Cell::new(5),
            inner: MemoryStore::default(),
        };
        let script = "Jo\n4\n4\n4\n4\n4\n\n\n\n\n\n\ny\nn\n";
        let (res, out) = run(&catalog, &store, script);
        assert_eq!(res.unwrap_err().kind(), ErrorKind::Submission);
        assert!(out.contains("RE01,4"));
        assert!(store.inner.rows().is_empty());
    }

    #[test]
    fn results_table() {
        let catalog = Catalog::builtin();
        let mut r = Response::new();
        r.set("RE01", Answer::Scale(4));
        r.set("EX01", Answer::Scale(1));
        let summary = score_responses(&catalog, &r);
        let gate = gate_status(&catalog, &r, GateMode::Open);
        let mut out: Vec<u8> = Vec::new();
        render_results(&mut out, &summary, &gate).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Overall mean: 4.50 (2/10 valid)"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[3], "Comparison by block:");
        // Ascending means: 4.00 then 5.00.
        assert!(lines[4].trim_start().starts_with("Rewards and Benefits"));
        assert_eq!(lines[4].matches('#').count(), 16);
        assert!(lines[4].ends_with("4.00"));
        assert!(lines[5].trim_start().starts_with("Risk Factors (Reversed)"));
        assert_eq!(lines[5].matches('#').count(), 20);
        assert!(lines[5].ends_with("5.00"));
    }

    #[test]
    fn bars_follow_the_scale() {
        assert_eq!(bar(1.0), "####");
        assert_eq!(bar(2.5), "#".repeat(10));
        assert_eq!(bar(5.0), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(0.0), "");
    }
}

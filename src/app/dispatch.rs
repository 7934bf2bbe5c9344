//! Pure half of action dispatch: what an action means once its inputs are known,
//! and what a finished `run` leads to. No I/O happens here; the caller performs
//! the resulting plan.

use crate::app::inputs::InputValues;
use crate::app::interpolate::{interpolate, interpolate_invocation};
use crate::error::DispatchError;
use crate::model::{decode_page, Action, Invocation, OnSuccess, Page};
use crate::services::executor::CommandOutput;

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Copy(String),
    Open(String),
    Exit,
    Reload,
    Run {
        title: String,
        invocation: Invocation,
        on_success: Option<OnSuccess>,
        confirm: bool,
    },
    /// Page identifier, resolved through the catalog.
    Push(String),
}

/// Resolve every reference up front so a bad one aborts before any side effect.
pub fn plan(
    action: &Action,
    values: &InputValues,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Plan, DispatchError> {
    Ok(match action {
        Action::Copy(a) => Plan::Copy(interpolate(&a.text, values, env)?),
        Action::Open(a) => Plan::Open(interpolate(&a.target, values, env)?),
        Action::Exit(_) => Plan::Exit,
        Action::Reload(_) => Plan::Reload,
        Action::Run(a) => {
            let invocation = a.command.to_invocation()?;
            Plan::Run {
                title: action.display_title(),
                invocation: interpolate_invocation(&invocation, values, env)?,
                on_success: a.on_success,
                confirm: a.confirm.unwrap_or(false),
            }
        }
        Action::Push(a) => Plan::Push(interpolate(&a.page, values, env)?),
    })
}

/// What to do after a `run` command completed.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No `onSuccess`; stdout is only reported.
    Done { stdout: String },
    Reload,
    Copy(String),
    Open(String),
    Exit,
    Push(Page),
}

/// A non-zero exit never reaches the `onSuccess` branch.
pub fn finish_run(
    on_success: Option<OnSuccess>,
    out: CommandOutput,
) -> Result<RunOutcome, DispatchError> {
    if !out.success() {
        return Err(DispatchError::Exit {
            code: out.code,
            stderr: out.stderr.trim_end().to_string(),
        });
    }
    Ok(match on_success {
        None => RunOutcome::Done { stdout: out.stdout },
        Some(OnSuccess::Reload) => RunOutcome::Reload,
        Some(OnSuccess::Exit) => RunOutcome::Exit,
        Some(OnSuccess::Copy) => RunOutcome::Copy(trim_newline(&out.stdout)),
        Some(OnSuccess::Open) => RunOutcome::Open(out.stdout.trim().to_string()),
        Some(OnSuccess::Push) => RunOutcome::Push(decode_page(&out.stdout)?),
    })
}

fn trim_newline(s: &str) -> String {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::inputs::{collect, Answers, Value};
    use crate::model::{decode_action_value, decode_input_value};
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn out(code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: "bad\n".into(),
        }
    }

    #[test]
    fn copy_text_is_interpolated() {
        let action = decode_action_value(json!({
            "type": "copy", "text": "hello ${name}",
            "inputs": [{"type": "textfield", "name": "name", "title": "Name"}]
        }))
        .unwrap();
        let values = collect(
            action.inputs(),
            &mut Answers(vec![Some(Value::Text("world".into()))]),
        )
        .unwrap();
        assert_eq!(
            plan(&action, &values, &no_env).unwrap(),
            Plan::Copy("hello world".into())
        );
    }

    #[test]
    fn unresolved_reference_aborts_planning() {
        let action = decode_action_value(json!({"type": "open", "target": "https://x/${id}"})).unwrap();
        let err = plan(&action, &InputValues::default(), &no_env).unwrap_err();
        assert!(matches!(err, DispatchError::Interpolation(_)));
    }

    #[test]
    fn run_plan_carries_policy() {
        let action = decode_action_value(json!({
            "type": "run", "title": "Create", "command": "gh issue create --draft ${draft}",
            "onSuccess": "push", "confirm": true,
            "inputs": [{"type": "checkbox", "name": "draft", "title": "Draft",
                        "default": true, "trueSubstitution": "yes", "falseSubstitution": "no"}]
        }))
        .unwrap();
        let values = collect(action.inputs(), &mut Answers(vec![])).unwrap();
        match plan(&action, &values, &no_env).unwrap() {
            Plan::Run {
                title,
                invocation,
                on_success,
                confirm,
            } => {
                assert_eq!(title, "Create");
                assert_eq!(invocation.args, vec!["issue", "create", "--draft", "yes"]);
                assert_eq!(on_success, Some(OnSuccess::Push));
                assert!(confirm);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn simple_variants_plan_directly() {
        let v = InputValues::default();
        for (doc, expected) in [
            (json!({"type": "exit"}), Plan::Exit),
            (json!({"type": "reload"}), Plan::Reload),
            (json!({"type": "push", "page": "next.json"}), Plan::Push("next.json".into())),
        ] {
            let action = decode_action_value(doc).unwrap();
            assert_eq!(plan(&action, &v, &no_env).unwrap(), expected);
        }
    }

    #[test]
    fn non_zero_exit_skips_every_on_success() {
        for policy in [
            None,
            Some(OnSuccess::Reload),
            Some(OnSuccess::Copy),
            Some(OnSuccess::Open),
            Some(OnSuccess::Exit),
            Some(OnSuccess::Push),
        ] {
            let err = finish_run(policy, out(2, r#"{"type":"list"}"#)).unwrap_err();
            match err {
                DispatchError::Exit { code, stderr } => {
                    assert_eq!(code, 2);
                    assert_eq!(stderr, "bad");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn successful_run_follows_on_success() {
        assert_eq!(
            finish_run(Some(OnSuccess::Copy), out(0, "abc123\n")).unwrap(),
            RunOutcome::Copy("abc123".into())
        );
        assert_eq!(
            finish_run(Some(OnSuccess::Open), out(0, " https://x \n")).unwrap(),
            RunOutcome::Open("https://x".into())
        );
        assert_eq!(
            finish_run(None, out(0, "done\n")).unwrap(),
            RunOutcome::Done {
                stdout: "done\n".into()
            }
        );
        match finish_run(Some(OnSuccess::Push), out(0, r#"{"type":"list","title":"new"}"#)).unwrap()
        {
            RunOutcome::Push(page) => assert_eq!(page.title(), Some("new")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            finish_run(Some(OnSuccess::Push), out(0, "not a page")),
            Err(DispatchError::Schema(_))
        ));
    }

    #[test]
    fn secure_input_interpolates_normally() {
        let input = decode_input_value(json!({"type": "textfield", "name": "t", "title": "T", "secure": true})).unwrap();
        let values = collect(&[input], &mut Answers(vec![Some(Value::Text("pw".into()))])).unwrap();
        let action = decode_action_value(json!({"type": "copy", "text": "${t}"})).unwrap();
        assert_eq!(plan(&action, &values, &no_env).unwrap(), Plan::Copy("pw".into()));
    }
}

//! Inline script materialization
//!
//! Steps with a `script` get an executable file under [`SCRIPTS_DIR`],
//! written by one shared `place-scripts` init container. Each file is copied
//! with a quoted heredoc whose delimiter is drawn from the random source, so
//! `${...}` in scripts is left alone and scripts may contain `EOF`.

use k8s_openapi::api::core::v1::{Container, Volume};
use steprun_common::crd::Step;
use steprun_common::names::restrict_length_with_random_suffix;
use steprun_common::random::RandomSource;
use tracing::debug;

use crate::config::{ImplicitResources, SCRIPTS_DIR};
use crate::containers::step_container_name;
use crate::error::CompileError;

/// Flag through which the entrypoint rewriter passes the step's command
pub(crate) const ENTRYPOINT_FLAG: &str = "-entrypoint";

const PLACE_SCRIPTS_NAME: &str = "place-scripts";
const HEREDOC_BASE: &str = "script-heredoc-randomly-generated";

/// Accumulates the `place-scripts` init container across steps
pub(crate) struct ScriptMaterializer<'a> {
    shell_image: &'a str,
    implicit: &'a ImplicitResources,
    random: &'a dyn RandomSource,
    body: String,
    placed: usize,
}

impl<'a> ScriptMaterializer<'a> {
    pub(crate) fn new(
        shell_image: &'a str,
        implicit: &'a ImplicitResources,
        random: &'a dyn RandomSource,
    ) -> Self {
        Self {
            shell_image,
            implicit,
            random,
            body: String::new(),
            placed: 0,
        }
    }

    /// Materialize the step's script, if any, and point the step at it
    pub(crate) fn materialize(&mut self, index: usize, step: &mut Step) -> Result<(), CompileError> {
        let Some(script) = step.script().map(str::to_string) else {
            return Ok(());
        };

        let args = step.container.args.take().unwrap_or_default();
        let redirects = args.iter().filter(|a| *a == ENTRYPOINT_FLAG).count();
        if redirects > 1 {
            return Err(CompileError::AmbiguousEntrypointRedirect {
                step: step_container_name(&step.container.name, index),
                count: redirects,
            });
        }

        let file_name = restrict_length_with_random_suffix(&format!("script-{}", index), self.random)?;
        let path = format!("{}/{}", SCRIPTS_DIR, file_name);
        let heredoc = restrict_length_with_random_suffix(HEREDOC_BASE, self.random)?;

        self.body.push_str(&format!(
            "tmpfile=\"{path}\"\n\
             touch ${{tmpfile}} && chmod +x ${{tmpfile}}\n\
             cat > ${{tmpfile}} << '{heredoc}'\n\
             {script}\n\
             {heredoc}\n"
        ));

        step.container.args = Some(redirect_args(args, &path));
        step.container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .push(self.implicit.scripts_volume_mount.clone());
        self.placed += 1;

        debug!(step = index, path = %path, "materialized step script");
        Ok(())
    }

    /// The shared init container and volume, or `None` if no step had a script
    pub(crate) fn finish(self) -> Result<Option<(Container, Volume)>, CompileError> {
        if self.placed == 0 {
            return Ok(None);
        }

        let container = Container {
            name: restrict_length_with_random_suffix(PLACE_SCRIPTS_NAME, self.random)?,
            image: Some(self.shell_image.to_string()),
            tty: Some(true),
            command: Some(vec!["sh".to_string()]),
            args: Some(vec!["-c".to_string(), self.body]),
            volume_mounts: Some(vec![self.implicit.scripts_volume_mount.clone()]),
            ..Default::default()
        };

        Ok(Some((container, self.implicit.scripts_volume.clone())))
    }
}

/// Graft the script path into the step's args.
///
/// If the entrypoint rewriter already ran, its `-entrypoint <cmd>` operand is
/// replaced; otherwise the path is appended.
fn redirect_args(mut args: Vec<String>, path: &str) -> Vec<String> {
    match args.iter().position(|a| a == ENTRYPOINT_FLAG) {
        Some(flag) if flag + 1 < args.len() => args[flag + 1] = path.to_string(),
        _ => args.push(path.to_string()),
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use steprun_common::random::SequenceRandom;

    fn step(name: &str) -> Step {
        Step::new(Container {
            name: name.to_string(),
            image: Some("alpine".to_string()),
            ..Default::default()
        })
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn steps_without_scripts_produce_nothing() {
        let implicit = ImplicitResources::default();
        let random = SequenceRandom::default();
        let mut materializer = ScriptMaterializer::new("busybox", &implicit, &random);
        let mut s = step("build");

        materializer.materialize(0, &mut s).unwrap();

        assert!(s.container.args.is_none());
        assert!(s.container.volume_mounts.is_none());
        assert!(materializer.finish().unwrap().is_none());
    }

    #[test]
    fn script_is_placed_with_random_heredoc() {
        let implicit = ImplicitResources::default();
        let random = SequenceRandom::default();
        let mut materializer = ScriptMaterializer::new("busybox", &implicit, &random);
        let mut s = step("hello").with_script("echo hi");

        materializer.materialize(0, &mut s).unwrap();
        let (container, volume) = materializer.finish().unwrap().unwrap();

        let path = s.container.args.as_ref().unwrap().last().unwrap().clone();
        assert!(path.starts_with("/builder/scripts/script-0-"));

        let body = &container.args.as_ref().unwrap()[1];
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], format!("tmpfile=\"{}\"", path));
        assert_eq!(lines[1], "touch ${tmpfile} && chmod +x ${tmpfile}");
        let heredoc = lines[2]
            .strip_prefix("cat > ${tmpfile} << '")
            .and_then(|rest| rest.strip_suffix('\''))
            .unwrap();
        assert!(heredoc.starts_with("script-heredoc-randomly-generated-"));
        assert_ne!(heredoc, "EOF");
        assert_eq!(lines[3], "echo hi");
        assert_eq!(lines[4], heredoc);

        assert_eq!(container.command, Some(strings(&["sh"])));
        assert_eq!(container.args.as_ref().unwrap()[0], "-c");
        assert_eq!(container.tty, Some(true));
        assert!(container.name.starts_with("place-scripts-"));
        assert_eq!(volume.name, "place-scripts");
        assert_eq!(
            s.container.volume_mounts.unwrap(),
            vec![implicit.scripts_volume_mount.clone()]
        );
    }

    #[test]
    fn scripts_share_one_container_with_distinct_delimiters() {
        let implicit = ImplicitResources::default();
        let random = SequenceRandom::default();
        let mut materializer = ScriptMaterializer::new("busybox", &implicit, &random);
        let mut first = step("a").with_script("echo a");
        let mut second = step("b").with_script("echo b");

        materializer.materialize(0, &mut first).unwrap();
        materializer.materialize(1, &mut second).unwrap();
        let (container, _) = materializer.finish().unwrap().unwrap();

        let body = &container.args.as_ref().unwrap()[1];
        let delimiters: Vec<&str> = body
            .lines()
            .filter_map(|l| l.strip_prefix("cat > ${tmpfile} << '"))
            .collect();
        assert_eq!(delimiters.len(), 2);
        assert_ne!(delimiters[0], delimiters[1]);
        assert_ne!(
            first.container.args.unwrap().last(),
            second.container.args.unwrap().last()
        );
    }

    #[test]
    fn entrypoint_operand_is_replaced() {
        let args = strings(&["-wait_file", "/steprun/0", "-entrypoint", "/bin/build", "--"]);
        assert_eq!(
            redirect_args(args, "/builder/scripts/script-0-abcde"),
            strings(&[
                "-wait_file",
                "/steprun/0",
                "-entrypoint",
                "/builder/scripts/script-0-abcde",
                "--"
            ])
        );
    }

    #[test]
    fn trailing_entrypoint_flag_gets_path_appended() {
        let args = strings(&["-entrypoint"]);
        assert_eq!(
            redirect_args(args, "/builder/scripts/s"),
            strings(&["-entrypoint", "/builder/scripts/s"])
        );
    }

    #[test]
    fn path_is_appended_without_redirect() {
        let args = strings(&["-x"]);
        assert_eq!(
            redirect_args(args, "/builder/scripts/s"),
            strings(&["-x", "/builder/scripts/s"])
        );
    }

    #[test]
    fn repeated_entrypoint_flag_is_rejected() {
        let implicit = ImplicitResources::default();
        let random = SequenceRandom::default();
        let mut materializer = ScriptMaterializer::new("busybox", &implicit, &random);
        let mut s = step("twice").with_script("true");
        s.container.args = Some(strings(&["-entrypoint", "a", "-entrypoint", "b"]));

        let err = materializer.materialize(0, &mut s).unwrap_err();

        match err {
            CompileError::AmbiguousEntrypointRedirect { step, count } => {
                assert_eq!(step, "step-twice");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

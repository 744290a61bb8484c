//! `berth image ...`

use super::shared::{check, confirm, parse_pairs, print_document, print_list, print_outcome};
use super::CommandContext;
use crate::cli::ImageCommand;
use crate::ui::spinner::PlainSpinner;
use crate::ui::table;
use anyhow::Result;
use berth_core::args::{BuildRequest, PruneOptions, PullRequest, RemoveOptions};
use berth_core::gateway::OperationResult;
use berth_core::model::ResourceKind;

pub async fn run(ctx: &CommandContext, command: ImageCommand) -> Result<()> {
    let service = &ctx.service;
    match command {
        ImageCommand::Ls => {
            let images = check(service.list_images().await)?;
            print_list(ctx, &images, table::images)
        }
        ImageCommand::Inspect { reference } => {
            let document = check(service.inspect(ResourceKind::Image, &reference).await)?;
            print_document(&document)
        }
        ImageCommand::Pull {
            reference,
            platform,
        } => {
            let spinner = PlainSpinner::start(&format!("Pulling {}", reference));
            let request = PullRequest {
                reference: reference.clone(),
                platform,
            };
            let out = finish(
                spinner,
                service.pull_image(&request).await,
                &format!("Pulled {}", reference),
            )?;
            print_outcome(ctx, "pull", &reference, last_line(&out))
        }
        ImageCommand::Build {
            context,
            tag,
            file,
            build_arg,
            label,
            target,
            no_cache,
        } => {
            let request = BuildRequest {
                context,
                tag,
                file,
                build_args: parse_pairs("build-arg", &build_arg)?,
                labels: parse_pairs("label", &label)?,
                target,
                no_cache,
            };
            let subject = request.tag.clone().unwrap_or_else(|| request.context.clone());
            let spinner = PlainSpinner::start(&format!("Building {}", subject));
            let out = finish(
                spinner,
                service.build_image(&request).await,
                &format!("Built {}", subject),
            )?;
            print_outcome(ctx, "build", &subject, last_line(&out))
        }
        ImageCommand::Rm { reference, force } => {
            if !confirm(ctx, &format!("Remove image {}?", reference))? {
                return Ok(());
            }
            let options = RemoveOptions {
                force,
                ..Default::default()
            };
            let out = check(service.remove_image(&reference, &options).await)?;
            print_outcome(ctx, "remove", &reference, &out)
        }
        ImageCommand::Prune { all } => {
            let prompt = if all {
                "Remove all unused images?"
            } else {
                "Remove dangling images?"
            };
            if !confirm(ctx, prompt)? {
                return Ok(());
            }
            let out = check(service.prune_images(&PruneOptions { all }).await)?;
            print_outcome(ctx, "prune", "images", &out)
        }
    }
}

fn finish(spinner: PlainSpinner, result: OperationResult<String>, done: &str) -> Result<String> {
    if result.success {
        spinner.finish_with_message(done);
    } else {
        spinner.fail_with_message(result.error.as_deref().unwrap_or("failed"));
    }
    check(result)
}

/// Pull and build chatter ends with the digest or image id
fn last_line(out: &str) -> &str {
    out.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_skips_trailing_blank_lines() {
        assert_eq!(
            last_line("Pulling fs layer\nDigest: sha256:abc\ndocker.io/library/alpine:3\n\n"),
            "docker.io/library/alpine:3"
        );
        assert_eq!(last_line(""), "");
    }
}

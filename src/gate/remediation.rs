//! Operator-facing remediation text for flag-version conflicts.
//!
//! A conflict aborts the whole pipeline run, so the message has to carry
//! the operator all the way to a fix: it lists the MS's current versions,
//! marks the ones involved, and spells out the three legitimate ways to
//! proceed (rename the stage, configure an explicit rewind, or allow
//! overwriting). The wording keeps close to the guidance the original
//! pipeline printed, which operators know well.

use std::fmt::Write;

use crate::resolver::ConflictReason;

use super::ConflictError;

const RULE: &str =
    "---------------------------------------------------------------------------------------------------";

/// Renders the full multi-line remediation message for a conflict.
pub fn render(conflict: &ConflictError) -> String {
    match conflict.reason {
        ConflictReason::WouldOverwriteBefore | ConflictReason::RewindTooLittle => {
            render_overwrite_conflict(conflict)
        }
        ConflictReason::RewindToNonExisting => render_missing_target(conflict),
    }
}

fn render_overwrite_conflict(conflict: &ConflictError) -> String {
    let stage = &conflict.stage.name;
    let mut msg = String::new();

    let _ = writeln!(
        msg,
        "Flag version conflict for {} . If you are running the pipeline on multiple targets",
        conflict.ms
    );
    msg.push_str("and/or .MS files please read the warning at the end of this message.\n");
    msg.push_str(RULE);
    msg.push('\n');
    let _ = writeln!(
        msg,
        "A stage named \"{}\" was already run on the .MS file {} with pipeline prefix \"{}\".",
        stage, conflict.ms, conflict.stage.prefix
    );
    if conflict.reason == ConflictReason::RewindTooLittle {
        if let Some(requested) = &conflict.requested {
            let _ = writeln!(
                msg,
                "and you are rewinding to a later flag version: {} .",
                requested
            );
        }
    }
    let _ = writeln!(
        msg,
        "Running \"{}\" again would overwrite existing flag versions, which will not be done",
        stage
    );
    msg.push_str("unless you explicitly request it.\n");
    msg.push_str("The current flag versions of this MS are (from the oldest to the most recent):\n");
    push_history(&mut msg, conflict);
    msg.push_str("You have the following options:\n");
    let _ = writeln!(
        msg,
        "    1) If you are happy with the flags currently in the FLAG column of this MS and want\n\
         \x20      to append new flags to them, change the name of this stage in the configuration\n\
         \x20      file by appending \"__n\" to it (where n is an integer not already taken in the\n\
         \x20      list above). New flag versions will be recorded under the new markers."
    );
    let _ = writeln!(
        msg,
        "    2) If you want to discard the flags obtained during the previous run of \"{}\" (and,\n\
         \x20      necessarily, all flags obtained thereafter; see list above) reset the stage to\n\
         \x20      its starting flag version by setting in the configuration file:\n\
         \x20          {}:\n\
         \x20            rewind_flags:\n\
         \x20              enable: true\n\
         \x20              mode: reset_stage\n\
         \x20      This rewinds to the flag version {}. All flags recorded after that\n\
         \x20      version will be lost.",
        stage, stage, conflict.markers.before
    );
    let _ = writeln!(
        msg,
        "    3) If you want to discard those flags and rewind to an even earlier flag version\n\
         \x20      from the list above, set:\n\
         \x20          {}:\n\
         \x20            rewind_flags:\n\
         \x20              enable: true\n\
         \x20              mode: rewind_to_version\n\
         \x20              version: <version_name>\n\
         \x20      All flags recorded after the requested version will be lost.",
        stage
    );
    let _ = writeln!(
        msg,
        "    4) If you really know what you are doing, allow flag versions to be overwritten by\n\
         \x20      setting:\n\
         \x20          {}:\n\
         \x20            rewind_flags:\n\
         \x20              overwrite_flag_versions: true\n\
         \x20      The stage will run again; \"{}\" will be overwritten and appended\n\
         \x20      to the list above (or to that list truncated to the version you are rewinding to).",
        stage, conflict.markers.before
    );
    msg.push_str(RULE);
    msg.push('\n');
    let _ = writeln!(
        msg,
        "Warning - Your choice will be applied to all .MS files processed by the stage \"{}\".",
        stage
    );
    msg.push_str(
        "If using rewind_flags mode \"rewind_to_version\", make sure to rewind to a flag version\n\
         that exists for all .MS files. In mode \"reset_stage\" each .MS file is taken care of\n\
         automatically.",
    );
    msg
}

fn render_missing_target(conflict: &ConflictError) -> String {
    let mut msg = String::new();
    let requested = conflict
        .requested
        .as_ref()
        .map(|name| name.as_str())
        .unwrap_or("<unset>");

    let _ = writeln!(
        msg,
        "You have asked to rewind the flags of {} to the version \"{}\" but this version",
        conflict.ms, requested
    );
    msg.push_str("does not exist. The available flag versions for this .MS file are:\n");
    push_history(&mut msg, conflict);
    msg.push_str(
        "Note that if you are running the pipeline on multiple targets and/or .MS files you\n\
         should rewind to a flag version that exists for all of them.",
    );
    msg
}

fn push_history(msg: &mut String, conflict: &ConflictError) {
    if conflict.history.is_empty() {
        msg.push_str("       (none recorded yet)\n");
        return;
    }
    for version in &conflict.history {
        let annotation = if *version == conflict.markers.before || *version == conflict.markers.after
        {
            "        <-- (this stage)"
        } else if conflict.requested.as_ref() == Some(version)
            && conflict.reason != ConflictReason::WouldOverwriteBefore
        {
            "        <-- (rewinding to this version)"
        } else {
            ""
        };
        let _ = writeln!(msg, "       {}{}", version, annotation);
    }
}

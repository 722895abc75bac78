//! Notification subject and body composition.
//!
//! Subjects keep the `SECO - RCR:` prefix the owners' mail filters already
//! match on.

use seco_core::environment::MiningType;
use seco_core::Environment;

pub fn created(owner_name: &str, env: &Environment) -> (String, String) {
    let subject = format!("SECO - RCR: {} created", env.name);
    let mut body = format!(
        "{owner_name}, your environment was created and the mining starts soon!\n"
    );
    body.push_str(&format!("Environment name: {}\n", env.name));
    body.push_str(&format!("Mining type: {}\n", env.mining.mining_type.as_str()));
    body.push_str(&format!("Repositories: {}\n", env.mining.repos.join(", ")));
    if env.mining.mining_type == MiningType::Organization {
        if let Some(org) = &env.mining.organization_name {
            body.push_str(&format!("Organization name: {org}\n"));
        }
    }
    body.push_str(&format!("Details: {}\n", env.mining.details));
    (subject, body)
}

pub fn mining_done(env_name: &str) -> (String, String) {
    (
        format!("SECO - RCR: {env_name} mining done"),
        format!(
            "The mining data for your environment {env_name} is done!\n\
             You need to log on the system to request the topics generation.\n"
        ),
    )
}

pub fn topics_done(env_name: &str) -> (String, String) {
    (
        format!("SECO - RCR: {env_name} topics generation done"),
        format!(
            "The topics for your environment {env_name} were generated!\n\
             You can log on the system to read them.\n"
        ),
    )
}

pub fn definition_voting_completed(env_name: &str) -> (String, String) {
    (
        format!("SECO - RCR: {env_name} definition rcr voting completed"),
        format!(
            "The RCR voting for your environment {env_name} was completed and processed!\n\
             You can log on the system to see the results.\n"
        ),
    )
}

pub fn priority_voting_completed(env_name: &str) -> (String, String) {
    (
        format!("SECO - RCR: {env_name} priority rcr voting completed"),
        format!(
            "The priority voting for your environment {env_name} was completed and processed!\n\
             You can log on the system to see the final RCR.\n"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_keep_the_seco_rcr_prefix() {
        let (subject, _) = mining_done("netdata ecosystem");
        assert_eq!(subject, "SECO - RCR: netdata ecosystem mining done");
        let (subject, _) = definition_voting_completed("netdata ecosystem");
        assert_eq!(
            subject,
            "SECO - RCR: netdata ecosystem definition rcr voting completed"
        );
    }
}

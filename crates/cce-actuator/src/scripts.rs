//! Startup scripts run on new instances to join them to the cluster.
//!
//! Templates carry literal placeholders. Every placeholder a role needs must
//! appear exactly once; rendering replaces that single occurrence.

use cce_db::MachineRole;

pub const VERSION: &str = "__VERSION__";
pub const SERVICE_CIDR: &str = "__SVC_CIDR__";
pub const POD_CIDR: &str = "__POD_CIDR__";
pub const PUBLIC_IP: &str = "__PUBLICIP__";
pub const MACHINE: &str = "__MACHINE__";
pub const TOKEN: &str = "__TOKEN__";
pub const MASTER: &str = "__MASTER__";

const MASTER_TEMPLATE: &str = include_str!("../scripts/master.sh");
const NODE_TEMPLATE: &str = include_str!("../scripts/node.sh");

const MASTER_TOKENS: &[&str] = &[VERSION, SERVICE_CIDR, POD_CIDR, PUBLIC_IP, MACHINE, TOKEN];
const NODE_TOKENS: &[&str] = &[
    VERSION,
    SERVICE_CIDR,
    POD_CIDR,
    PUBLIC_IP,
    MACHINE,
    TOKEN,
    MASTER,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("template has no {0} placeholder")]
    MissingToken(&'static str),

    #[error("template has {count} {token} placeholders, expected one")]
    DuplicateToken { token: &'static str, count: usize },

    #[error("no value for {0}")]
    MissingValue(&'static str),

    #[error("{0} left unresolved after rendering")]
    Unresolved(&'static str),
}

/// Values substituted into a startup script.
#[derive(Debug, Clone)]
pub struct ScriptParams<'a> {
    pub version: &'a str,
    pub service_cidr: &'a str,
    pub pod_cidr: &'a str,
    pub public_ip: &'a str,
    pub machine: &'a str,
    pub token: &'a str,
    /// Internal address of the master; nodes only.
    pub master: Option<&'a str>,
}

impl ScriptParams<'_> {
    fn value(&self, token: &'static str) -> Result<&str, ScriptError> {
        match token {
            VERSION => Ok(self.version),
            SERVICE_CIDR => Ok(self.service_cidr),
            POD_CIDR => Ok(self.pod_cidr),
            PUBLIC_IP => Ok(self.public_ip),
            MACHINE => Ok(self.machine),
            TOKEN => Ok(self.token),
            MASTER => self.master.ok_or(ScriptError::MissingValue(MASTER)),
            _ => Err(ScriptError::MissingValue(token)),
        }
    }
}

pub fn template(role: MachineRole) -> &'static str {
    match role {
        MachineRole::Master => MASTER_TEMPLATE,
        MachineRole::Node => NODE_TEMPLATE,
    }
}

fn tokens(role: MachineRole) -> &'static [&'static str] {
    match role {
        MachineRole::Master => MASTER_TOKENS,
        MachineRole::Node => NODE_TOKENS,
    }
}

/// Render the built-in script for `role`.
pub fn render(role: MachineRole, params: &ScriptParams<'_>) -> Result<String, ScriptError> {
    render_template(template(role), role, params)
}

/// Render `template` with the placeholder set of `role`.
pub fn render_template(
    template: &str,
    role: MachineRole,
    params: &ScriptParams<'_>,
) -> Result<String, ScriptError> {
    let tokens = tokens(role);
    for &token in tokens {
        match template.matches(token).count() {
            0 => return Err(ScriptError::MissingToken(token)),
            1 => {}
            count => return Err(ScriptError::DuplicateToken { token, count }),
        }
    }

    let mut script = template.to_string();
    for &token in tokens {
        script = script.replacen(token, params.value(token)?, 1);
    }

    if let Some(&token) = NODE_TOKENS.iter().find(|t| script.contains(**t)) {
        return Err(ScriptError::Unresolved(token));
    }
    Ok(script)
}

// onboard-service/src/services/role_provisioner.rs
use crate::models::{role_name, CommunityId, NewRole, ProvisionError, Role, RoleGrant, RoleId, UserId};
use crate::platform::CommunityPlatform;
use log::{error, info, warn};
use rand::Rng;

fn random_color() -> u32 {
    rand::thread_rng().gen_range(0..=0x00FF_FFFF)
}

// Highest role held by `held` (the default role always counts)
pub fn top_role_of<'a>(roles: &'a [Role], held: &[RoleId], default_role_id: RoleId) -> Option<&'a Role> {
    roles
        .iter()
        .filter(|r| r.id == default_role_id || held.contains(&r.id))
        .max_by_key(|r| r.position)
}

pub async fn bot_top_role(platform: &dyn CommunityPlatform, community_id: CommunityId) -> Result<Role, ProvisionError> {
    let roles = platform.roles(community_id).await?;
    let held = platform.member_role_ids(community_id, platform.bot_user_id()).await?;
    top_role_of(&roles, &held, platform.default_role_id(community_id))
        .cloned()
        .ok_or_else(|| ProvisionError::NotFound(format!("top role of the service in community {}", community_id)))
}

// Existing role of the team's normalised name, without creating anything
pub async fn find_team_role(
    platform: &dyn CommunityPlatform,
    community_id: CommunityId,
    team_name: &str,
) -> Result<Option<Role>, ProvisionError> {
    let name = role_name(team_name);
    if name.is_empty() {
        return Ok(None);
    }
    let roles = platform.roles(community_id).await?;
    Ok(roles.into_iter().find(|r| r.name == name))
}

/// Returns the team's role, creating it when no role of the normalised name exists.
///
/// New roles get a random colour, are hoisted and mentionable, and are moved directly
/// below the service's top role. A failed move is logged, not returned: the hierarchy
/// check at grant time reports what the administrator has to fix.
pub async fn ensure_team_role(
    platform: &dyn CommunityPlatform,
    community_id: CommunityId,
    team_name: &str,
) -> Result<Role, ProvisionError> {
    let name = role_name(team_name);
    if name.is_empty() {
        return Err(ProvisionError::NotFound(format!("usable role name for team {:?}", team_name)));
    }

    if let Some(existing) = find_team_role(platform, community_id, team_name).await? {
        return Ok(existing);
    }

    let grants = platform.bot_grants(community_id).await?;
    if !grants.manage_roles {
        error!("❌ Missing MANAGE_ROLES in community {}", community_id);
        return Err(ProvisionError::Permission("MANAGE_ROLES".to_string()));
    }

    let mut role = platform
        .create_role(
            community_id,
            &NewRole {
                name: name.clone(),
                color: random_color(),
                hoist: true,
                mentionable: true,
                reason: format!("auto-created for {}", team_name),
            },
        )
        .await?;
    info!("✅ Created role: {} in community {}", name, community_id);

    match bot_top_role(platform, community_id).await {
        Ok(top) if top.position > 1 => {
            let target = top.position - 1;
            match platform.set_role_position(community_id, role.id, target).await {
                Ok(()) => {
                    role.position = target;
                    info!("🔀 Moved {} to position {}", name, target);
                }
                Err(e) => warn!("⚠️ Couldn't position role {}: {} - ensure bot role is high enough", name, e),
            }
        }
        Ok(_) => warn!("⚠️ Couldn't reposition role {} - bot role sits too low", name),
        Err(e) => warn!("⚠️ Couldn't resolve bot role to position {}: {}", name, e),
    }

    Ok(role)
}

/// Gives `user_id` the team's role.
///
/// Idempotent: a member already holding the role succeeds without a platform write.
/// Refuses with [`ProvisionError::Hierarchy`] unless the service's top role sits
/// strictly above the team role; no grant call is attempted in that case.
pub async fn assign_team_role(
    platform: &dyn CommunityPlatform,
    community_id: CommunityId,
    user_id: UserId,
    team_name: &str,
) -> Result<(Role, RoleGrant), ProvisionError> {
    let grants = platform.bot_grants(community_id).await?;
    if !grants.manage_roles {
        error!("❌ Missing MANAGE_ROLES in community {}", community_id);
        return Err(ProvisionError::Permission("MANAGE_ROLES".to_string()));
    }

    let role = ensure_team_role(platform, community_id, team_name).await?;

    let member_roles = platform.member_role_ids(community_id, user_id).await?;
    if member_roles.contains(&role.id) {
        return Ok((role, RoleGrant::AlreadyHeld));
    }

    // Fresh read: repositioning may have shifted other roles
    let roles = platform.roles(community_id).await?;
    let bot_roles = platform.member_role_ids(community_id, platform.bot_user_id()).await?;
    let top = top_role_of(&roles, &bot_roles, platform.default_role_id(community_id))
        .cloned()
        .ok_or_else(|| ProvisionError::NotFound(format!("top role of the service in community {}", community_id)))?;
    let current = roles.iter().find(|r| r.id == role.id).cloned().unwrap_or(role);

    info!(
        "⚙️ Hierarchy Check in {} | Bot: {} vs {}: {}",
        community_id, top.position, current.name, current.position
    );
    if top.position <= current.position {
        let err = ProvisionError::Hierarchy {
            bot_role: top.name.clone(),
            team_role: current.name.clone(),
            community: community_id,
        };
        error!("❌ {}", err);
        return Err(err);
    }

    platform.add_member_role(community_id, user_id, current.id).await?;
    info!("✅ Granted {} to user {} in community {}", current.name, user_id, community_id);
    Ok((current, RoleGrant::Granted))
}

use allow_rules::{Authz, Context, Error, Policy, Result, RuleFn};

// principal attached by the embedding application
#[derive(Clone)]
struct User {
    name: String,
    role: String,
}

struct Project {
    owner: String,
}

fn main() -> Result<()> {
    let authz = Authz::builder().without_metrics().build()?;
    let key = authz.auth_ctx_key().clone();

    // rule without a namespace lands in the default policy.
    let admin_key = key.clone();
    authz.register_rule(
        "create-project",
        RuleFn::new(move |ctx, _resource| match ctx.principal::<User>(&admin_key) {
            Some(user) if user.role == "Admin" => Ok(()),
            _ => Err("only admins can create projects".into()),
        }),
    );

    // namespaced rules.
    authz.register_policy(Policy::new("project").with_rule(
        "delete",
        RuleFn::new(move |ctx, resource| {
            let user = ctx.principal::<User>(&key).ok_or("anonymous")?;
            match resource.downcast_ref::<Project>() {
                Some(project) if project.owner == user.name => Ok(()),
                Some(_) => Err(format!("{} does not own the project", user.name).into()),
                None => Err("not a project".into()),
            }
        }),
    ))?;

    let guest = User {
        name: "bob".into(),
        role: "Guest".into(),
    };
    let ctx = authz.set_auth_ctx(&Context::background(), Some(guest));
    let project = Project {
        owner: "alice".into(),
    };

    for rule in &["create-project", "project.delete", "project.archive"] {
        match authz.authorize(&ctx, rule, &project) {
            Ok(()) => println!("{}: allowed", rule),
            Err(Error::Denied(reason)) => println!("{}: denied ({})", rule, reason),
            Err(e) => println!("{}: error ({})", rule, e),
        }
    }

    Ok(())
}

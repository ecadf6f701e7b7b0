use allow_rules::{Authz, Context, DynamicPolicy, Error, Result, RuleResult};

#[derive(Clone)]
struct User {
    name: String,
}

struct Project {
    owner: String,
}

// built fresh for every authorization request.
#[derive(Default)]
struct ProjectPolicy {
    user: Option<User>,
}

impl ProjectPolicy {
    fn get(&self, _ctx: &Context, _project: &Project) -> RuleResult {
        Ok(())
    }

    fn transfer(&self, _ctx: &Context, project: &Project, to: &String) -> RuleResult {
        match &self.user {
            Some(user) if user.name == project.owner && !to.is_empty() => Ok(()),
            _ => Err("only the owner can transfer a project".into()),
        }
    }
}

fn main() -> Result<()> {
    let authz = Authz::new()?;

    authz.register_policy_factory(
        "project",
        DynamicPolicy::builder(ProjectPolicy::default)
            .with_auth_ctx(|policy: &mut ProjectPolicy, user: User| policy.user = Some(user))
            .with_method("get", |policy: &ProjectPolicy, ctx, project: &Project| {
                policy.get(ctx, project)
            })
            .with_method_arg(
                "transfer-ownership",
                |policy: &ProjectPolicy, ctx, project: &Project, to: &String| {
                    policy.transfer(ctx, project, to)
                },
            )
            .build(),
    )?;

    let ctx = authz.set_auth_ctx(
        &Context::background(),
        Some(User {
            name: "alice".into(),
        }),
    );
    let project = Project {
        owner: "alice".into(),
    };
    let to = String::from("bob");

    authz.authorize_method(&ctx, &project, "project", "get", &[])?;
    authz.authorize_method(&ctx, &project, "project", "transfer-ownership", &[&to])?;

    match authz.authorize_method(&ctx, &"project-1", "project", "get", &[]) {
        Err(Error::InvalidResource { expected }) => println!("resource rejected, expected {}", expected),
        other => println!("unexpected outcome {:?}", other),
    }

    if let Some(registry) = authz.metrics_registry() {
        for family in registry.gather() {
            println!("{}: {} series", family.get_name(), family.get_metric().len());
        }
    }

    Ok(())
}

// Route composition
//
// Each endpoint is mounted behind its own pipeline, so the guard chain of every
// route can be read off this file top to bottom. Pipelines are validated when
// the router is built; an invalid chain fails startup, not a request.

use axum::{
    middleware,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;

use crate::auth::{
    authorize::{RequireOwnerOrAdmin, RequireRole},
    handlers as auth_handlers,
    middleware::Authenticate,
    models::Role,
    password::MIN_PASSWORD_LENGTH,
};
use crate::pipeline::{run_pipeline, Pipeline, PipelineBuilder, PipelineError};
use crate::tutorials::{
    handlers as tutorial_handlers,
    models::{
        Category, Difficulty, DESCRIPTION_MAX, DESCRIPTION_MIN, MAX_PAGE_SIZE, MAX_TAGS, TAG_MAX, TITLE_MAX,
        TITLE_MIN,
    },
};
use crate::users::{
    handlers as user_handlers,
    models::{BIO_MAX, DISPLAY_NAME_MAX},
};
use crate::validation::FieldRule;
use crate::AppState;

/// Mount `pipeline` in front of every handler of `route`
fn guard(route: MethodRouter<AppState>, pipeline: Pipeline) -> MethodRouter<AppState> {
    route.layer(middleware::from_fn_with_state(Arc::new(pipeline), run_pipeline))
}

/// Shared pieces every pipeline is built from
struct Guards {
    state: AppState,
}

impl Guards {
    fn pipeline(&self) -> PipelineBuilder {
        Pipeline::builder().body_limit(self.state.body_limit)
    }

    fn authenticate(&self) -> Authenticate {
        Authenticate::required(self.state.tokens.clone(), self.state.users.clone())
    }

    fn authenticate_optional(&self) -> Authenticate {
        Authenticate::optional(self.state.tokens.clone(), self.state.users.clone())
    }
}

fn id_param() -> FieldRule {
    FieldRule::param("id").uuid()
}

fn display_name() -> FieldRule {
    FieldRule::body("display_name").string().length(2, DISPLAY_NAME_MAX)
}

fn role_names() -> Vec<&'static str> {
    Role::ALL.iter().map(Role::as_str).collect()
}

/// Rules for a tutorial body. Every field is optional on update.
fn tutorial_rules(partial: bool) -> Vec<FieldRule> {
    let rules = vec![
        FieldRule::body("title").string().length(TITLE_MIN, TITLE_MAX),
        FieldRule::body("description")
            .string()
            .length(DESCRIPTION_MIN, DESCRIPTION_MAX),
        FieldRule::body("category").one_of(&Category::names()),
        FieldRule::body("difficulty").one_of(&Difficulty::names()),
        FieldRule::body("tags")
            .optional()
            .array(Some(MAX_TAGS), Some(TAG_MAX)),
        FieldRule::body("published").optional().boolean(),
    ];

    if partial {
        rules.into_iter().map(FieldRule::optional).collect()
    } else {
        rules
    }
}

fn auth_routes(guards: &Guards) -> Result<Router<AppState>, PipelineError> {
    let register = guards
        .pipeline()
        .sanitize()
        .rules(vec![
            FieldRule::body("email").string().max_length(255).email(),
            FieldRule::body("password")
                .sensitive()
                .string()
                .min_length(MIN_PASSWORD_LENGTH)
                .max_length(128),
            display_name(),
        ])
        .build()?;

    let login = guards
        .pipeline()
        .sanitize()
        .rules(vec![
            FieldRule::body("email").string().email(),
            FieldRule::body("password").sensitive().string(),
        ])
        .build()?;

    let refresh = guards
        .pipeline()
        .rules(vec![FieldRule::body("refresh_token").sensitive().string()])
        .build()?;

    let me = guards.pipeline().stage(guards.authenticate()).build()?;

    Ok(Router::new()
        .route("/api/auth/register", guard(post(auth_handlers::register_handler), register))
        .route("/api/auth/login", guard(post(auth_handlers::login_handler), login))
        .route("/api/auth/refresh", guard(post(auth_handlers::refresh_handler), refresh))
        .route("/api/auth/me", guard(get(auth_handlers::me_handler), me)))
}

fn user_routes(guards: &Guards) -> Result<Router<AppState>, PipelineError> {
    let read_profile = guards
        .pipeline()
        .stage(guards.authenticate())
        .stage(RequireOwnerOrAdmin::param("id"))
        .rules(vec![id_param()])
        .build()?;

    let update_profile = guards
        .pipeline()
        .sanitize()
        .stage(guards.authenticate())
        .stage(RequireOwnerOrAdmin::param("id"))
        .rules(vec![
            id_param(),
            display_name().optional(),
            FieldRule::body("bio").optional().string().max_length(BIO_MAX),
        ])
        .build()?;

    let admin_status = || {
        guards
            .pipeline()
            .stage(guards.authenticate())
            .stage(RequireRole::admin_only())
            .rules(vec![id_param()])
            .build()
    };

    let change_role = guards
        .pipeline()
        .sanitize()
        .stage(guards.authenticate())
        .stage(RequireRole::admin_only())
        .rules(vec![id_param(), FieldRule::body("role").one_of(&role_names())])
        .build()?;

    Ok(Router::new()
        .route("/api/users/:id", guard(get(user_handlers::get_user_handler), read_profile))
        .route("/api/users/:id", guard(put(user_handlers::update_user_handler), update_profile))
        .route(
            "/api/admin/users/:id/deactivate",
            guard(patch(user_handlers::deactivate_user_handler), admin_status()?),
        )
        .route(
            "/api/admin/users/:id/activate",
            guard(patch(user_handlers::activate_user_handler), admin_status()?),
        )
        .route(
            "/api/admin/users/:id/role",
            guard(patch(user_handlers::change_role_handler), change_role),
        ))
}

fn tutorial_routes(guards: &Guards) -> Result<Router<AppState>, PipelineError> {
    let list = guards
        .pipeline()
        .sanitize()
        .stage(guards.authenticate_optional())
        .rules(vec![
            FieldRule::query("page").optional().integer(Some(1), Some(10_000)),
            FieldRule::query("limit")
                .optional()
                .integer(Some(1), Some(i64::from(MAX_PAGE_SIZE))),
            FieldRule::query("category").optional().one_of(&Category::names()),
            FieldRule::query("difficulty").optional().one_of(&Difficulty::names()),
        ])
        .build()?;

    let read = guards
        .pipeline()
        .stage(guards.authenticate_optional())
        .rules(vec![id_param()])
        .build()?;

    let create = guards
        .pipeline()
        .sanitize()
        .stage(guards.authenticate())
        .stage(RequireRole::creator_or_admin())
        .rules(tutorial_rules(false))
        .build()?;

    let update = guards
        .pipeline()
        .sanitize()
        .stage(guards.authenticate())
        .stage(RequireRole::creator_or_admin())
        .rules(vec![id_param()])
        .rules(tutorial_rules(true))
        .build()?;

    let remove = guards
        .pipeline()
        .stage(guards.authenticate())
        .stage(RequireRole::creator_or_admin())
        .rules(vec![id_param()])
        .build()?;

    Ok(Router::new()
        .route("/api/tutorials", guard(get(tutorial_handlers::list_tutorials_handler), list))
        .route("/api/tutorials", guard(post(tutorial_handlers::create_tutorial_handler), create))
        .route("/api/tutorials/:id", guard(get(tutorial_handlers::get_tutorial_handler), read))
        .route("/api/tutorials/:id", guard(put(tutorial_handlers::update_tutorial_handler), update))
        .route(
            "/api/tutorials/:id",
            guard(delete(tutorial_handlers::delete_tutorial_handler), remove),
        ))
}

/// Every guarded API route
pub fn api_routes(state: &AppState) -> Result<Router<AppState>, PipelineError> {
    let guards = Guards { state: state.clone() };

    Ok(Router::new()
        .merge(auth_routes(&guards)?)
        .merge(user_routes(&guards)?)
        .merge(tutorial_routes(&guards)?))
}

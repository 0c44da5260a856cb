//! Serialized shapes for records with their relationships expanded.
//!
//! Exactly one level is expanded: a nested parent is emitted as its flat
//! columns and never carries its own `signups`, so the reverse edge back to
//! the record being serialized is always elided.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Activity, Camper, Signup};
use crate::orm::Db;

/// An activity with each signup and the camper behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: Activity,
    pub signups: Vec<ActivitySignup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySignup {
    #[serde(flatten)]
    pub signup: Signup,
    pub camper: Option<Camper>,
}

/// A camper with each signup and the activity it is for.
#[derive(Debug, Clone, Serialize)]
pub struct CamperDetail {
    #[serde(flatten)]
    pub camper: Camper,
    pub signups: Vec<CamperSignup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CamperSignup {
    #[serde(flatten)]
    pub signup: Signup,
    pub activity: Option<Activity>,
}

/// A signup with both of its parents.
#[derive(Debug, Clone, Serialize)]
pub struct SignupDetail {
    #[serde(flatten)]
    pub signup: Signup,
    pub camper: Option<Camper>,
    pub activity: Option<Activity>,
}

impl ActivityDetail {
    pub async fn load(db: &Db, id: i64) -> Result<Self> {
        let activity = Activity::get(db, id).await?;
        let mut campers: HashMap<i64, Option<Camper>> = HashMap::new();
        let mut signups = Vec::new();
        for signup in activity.signups(db).await? {
            let camper = match signup.camper_id() {
                Some(camper_id) => match campers.get(&camper_id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let camper = Camper::find(db, camper_id).await?;
                        campers.insert(camper_id, camper.clone());
                        camper
                    }
                },
                None => None,
            };
            signups.push(ActivitySignup { signup, camper });
        }
        Ok(ActivityDetail { activity, signups })
    }
}

impl CamperDetail {
    pub async fn load(db: &Db, id: i64) -> Result<Self> {
        let camper = Camper::get(db, id).await?;
        let mut activities: HashMap<i64, Option<Activity>> = HashMap::new();
        let mut signups = Vec::new();
        for signup in camper.signups(db).await? {
            let activity = match signup.activity_id() {
                Some(activity_id) => match activities.get(&activity_id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let activity = Activity::find(db, activity_id).await?;
                        activities.insert(activity_id, activity.clone());
                        activity
                    }
                },
                None => None,
            };
            signups.push(CamperSignup { signup, activity });
        }
        Ok(CamperDetail { camper, signups })
    }
}

impl SignupDetail {
    pub async fn load(db: &Db, id: i64) -> Result<Self> {
        let signup = Signup::get(db, id).await?;
        let camper = signup.camper(db).await?;
        let activity = signup.activity(db).await?;
        Ok(SignupDetail {
            signup,
            camper,
            activity,
        })
    }
}

// src/models/caller.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("Unknown role '{}'", other))),
        }
    }
}

/// The authenticated `(user id, role)` pair behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn student(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Student,
        }
    }

    pub fn teacher(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Teacher,
        }
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self.role, Role::Teacher | Role::Admin)
    }

    pub fn ensure_teacher(&self) -> Result<(), AppError> {
        if !self.is_teacher() {
            return Err(AppError::Forbidden("Teacher role required".to_string()));
        }
        Ok(())
    }

    /// Only the student who owns the attempt may act on it.
    pub fn ensure_owner(&self, student_id: i64) -> Result<(), AppError> {
        if self.user_id != student_id {
            return Err(AppError::Forbidden("Not the owner of this attempt".to_string()));
        }
        Ok(())
    }
}

use std::{collections::HashMap, str::FromStr};

use serde::Deserialize;

use super::{
    error::{Error, FieldErrors, TypeError},
    schema::Id,
};
use crate::constants::{
    EMAIL_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH, TRUE_VALUES, USERNAME_MAX_LENGTH,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const AT_LEAST_ONE: &str = "Ensure this value is greater than or equal to 1.";

/// Decoded query string; keeps every occurrence of repeated keys.
#[derive(Debug, Default)]
pub struct Form {
    inner: Vec<(String, String)>,
}

impl Form {
    pub fn from_query(raw: &str) -> Result<Self, Error> {
        let inner: Vec<(String, String)> = serde_urlencoded::from_str(raw)
            .map_err(|_| TypeError::new("Malformed query string"))?;

        Ok(Self { inner })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| Error::field(key, "A valid integer is required.")),
            None => Ok(None),
        }
    }

    pub fn get_flag(&self, key: &str) -> bool {
        self.get_str(key)
            .map(|value| TRUE_VALUES.contains(&value))
            .unwrap_or(false)
    }
}

fn check_text(errors: &mut FieldErrors, field: &str, value: &Option<String>, max: usize) {
    match value {
        None => errors.add(field, REQUIRED),
        Some(value) => check_present_text(errors, field, value, max),
    }
}

fn check_present_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
    } else if value.chars().count() > max {
        errors.add(
            field,
            &format!("Ensure this field has no more than {max} characters."),
        );
    }
}

fn positive(value: i64) -> Option<i32> {
    if value < 1 {
        return None;
    }
    i32::try_from(value).ok()
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IngredientAmount {
    pub id: Option<i64>,
    pub amount: Option<i64>,
}

/// Body of recipe create (all fields required) and update (all optional).
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipePayload {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<(Id, i32)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<(Id, i32)>>,
}

impl RecipePayload {
    pub fn validate_create(self) -> Result<NewRecipe, Error> {
        let mut errors = FieldErrors::default();

        check_text(&mut errors, "name", &self.name, NAME_MAX_LENGTH);
        check_text(&mut errors, "text", &self.text, usize::MAX);
        let cooking_time = match self.cooking_time {
            Some(value) => validate_cooking_time(&mut errors, value),
            None => {
                errors.add("cooking_time", REQUIRED);
                None
            }
        };
        let tags = match &self.tags {
            Some(tags) => validate_tags(&mut errors, tags),
            None => {
                errors.add("tags", REQUIRED);
                None
            }
        };
        let ingredients = match &self.ingredients {
            Some(ingredients) => validate_ingredients(&mut errors, ingredients),
            None => {
                errors.add("ingredients", REQUIRED);
                None
            }
        };

        errors.into_result()?;

        match (self.name, self.text, cooking_time, tags, ingredients) {
            (Some(name), Some(text), Some(cooking_time), Some(tags), Some(ingredients)) => {
                Ok(NewRecipe {
                    name: name.trim().to_string(),
                    image: self.image,
                    text,
                    cooking_time,
                    tags,
                    ingredients,
                })
            }
            _ => Err(TypeError::new("Incomplete recipe").into()),
        }
    }

    pub fn validate_update(self) -> Result<RecipeChanges, Error> {
        let mut errors = FieldErrors::default();

        if let Some(name) = &self.name {
            check_present_text(&mut errors, "name", name, NAME_MAX_LENGTH);
        }
        if let Some(text) = &self.text {
            check_present_text(&mut errors, "text", text, usize::MAX);
        }
        let cooking_time = self
            .cooking_time
            .and_then(|value| validate_cooking_time(&mut errors, value));
        let tags = self
            .tags
            .as_ref()
            .and_then(|tags| validate_tags(&mut errors, tags));
        let ingredients = self
            .ingredients
            .as_ref()
            .and_then(|ingredients| validate_ingredients(&mut errors, ingredients));

        errors.into_result()?;

        Ok(RecipeChanges {
            name: self.name.map(|name| name.trim().to_string()),
            image: self.image,
            text: self.text,
            cooking_time,
            tags,
            ingredients,
        })
    }
}

fn validate_cooking_time(errors: &mut FieldErrors, value: i64) -> Option<i32> {
    let cooking_time = positive(value);
    if cooking_time.is_none() {
        errors.add("cooking_time", AT_LEAST_ONE);
    }
    cooking_time
}

fn validate_tags(errors: &mut FieldErrors, tags: &[Id]) -> Option<Vec<Id>> {
    if tags.is_empty() {
        errors.add("tags", "Add one or more values to the tags field.");
        return None;
    }

    let mut unique: Vec<Id> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(tag) {
            unique.push(*tag);
        }
    }
    Some(unique)
}

/// Checks every `(id, amount)` line; duplicates are kept and summed on insert.
fn validate_ingredients(
    errors: &mut FieldErrors,
    ingredients: &[IngredientAmount],
) -> Option<Vec<(Id, i32)>> {
    if ingredients.is_empty() {
        errors.add("ingredients", "Add one or more ingredients.");
        return None;
    }

    let mut lines = Vec::with_capacity(ingredients.len());
    for ingredient in ingredients {
        let id = match ingredient.id {
            None => {
                errors.add("id", REQUIRED);
                None
            }
            Some(id) => {
                let id = positive(id);
                if id.is_none() {
                    errors.add("id", AT_LEAST_ONE);
                }
                id
            }
        };
        let amount = match ingredient.amount {
            None => {
                errors.add("amount", REQUIRED);
                None
            }
            Some(amount) => {
                let amount = positive(amount);
                if amount.is_none() {
                    errors.add("amount", AT_LEAST_ONE);
                }
                amount
            }
        };

        if let (Some(id), Some(amount)) = (id, amount) {
            lines.push((id, amount));
        }
    }

    if lines.len() != ingredients.len() {
        return None;
    }

    let mut totals: HashMap<Id, i32> = HashMap::new();
    for (id, amount) in &lines {
        let total = totals.entry(*id).or_insert(0);
        match total.checked_add(*amount) {
            Some(sum) => *total = sum,
            None => {
                errors.add(
                    "amount",
                    &format!("Ensure the total amount of an ingredient is less than or equal to {}.", i32::MAX),
                );
                return None;
            }
        }
    }
    Some(lines)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RegisterPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterPayload {
    pub fn validate(self) -> Result<NewUser, Error> {
        let mut errors = FieldErrors::default();

        check_text(&mut errors, "email", &self.email, EMAIL_MAX_LENGTH);
        if let Some(email) = &self.email {
            if !is_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }
        check_text(&mut errors, "username", &self.username, USERNAME_MAX_LENGTH);
        if let Some(username) = &self.username {
            if !is_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }
        check_text(&mut errors, "first_name", &self.first_name, USERNAME_MAX_LENGTH);
        check_text(&mut errors, "last_name", &self.last_name, USERNAME_MAX_LENGTH);
        match &self.password {
            Some(password) => check_password(&mut errors, "password", password),
            None => errors.add("password", REQUIRED),
        }

        errors.into_result()?;

        match (
            self.email,
            self.username,
            self.first_name,
            self.last_name,
            self.password,
        ) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) => {
                Ok(NewUser {
                    email: email.trim().to_lowercase(),
                    username: username.trim().to_string(),
                    first_name: first_name.trim().to_string(),
                    last_name: last_name.trim().to_string(),
                    password,
                })
            }
            _ => Err(TypeError::new("Incomplete user").into()),
        }
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn is_username(value: &str) -> bool {
    value
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            field,
            &format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
            ),
        );
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    pub fn validate(self) -> Result<(String, String), Error> {
        let mut errors = FieldErrors::default();
        check_text(&mut errors, "email", &self.email, EMAIL_MAX_LENGTH);
        if self.password.as_deref().map(str::is_empty).unwrap_or(true) {
            errors.add("password", REQUIRED);
        }
        errors.into_result()?;

        match (self.email, self.password) {
            (Some(email), Some(password)) => Ok((email.trim().to_lowercase(), password)),
            _ => Err(TypeError::new("Incomplete credentials").into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SetPasswordPayload {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

impl SetPasswordPayload {
    pub fn validate(self) -> Result<(String, String), Error> {
        let mut errors = FieldErrors::default();
        if self.current_password.is_none() {
            errors.add("current_password", REQUIRED);
        }
        match &self.new_password {
            Some(password) => check_password(&mut errors, "new_password", password),
            None => errors.add("new_password", REQUIRED),
        }
        errors.into_result()?;

        match (self.current_password, self.new_password) {
            (Some(current), Some(new)) => Ok((current, new)),
            _ => Err(TypeError::new("Incomplete password change").into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

impl IngredientPayload {
    pub fn validate(self) -> Result<(String, String), Error> {
        let mut errors = FieldErrors::default();
        check_text(&mut errors, "name", &self.name, NAME_MAX_LENGTH);
        check_text(
            &mut errors,
            "measurement_unit",
            &self.measurement_unit,
            NAME_MAX_LENGTH,
        );
        errors.into_result()?;

        match (self.name, self.measurement_unit) {
            (Some(name), Some(unit)) => Ok((name.trim().to_string(), unit.trim().to_string())),
            _ => Err(TypeError::new("Incomplete ingredient").into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TagPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagPayload {
    pub fn validate(self) -> Result<NewTag, Error> {
        let mut errors = FieldErrors::default();
        check_text(&mut errors, "name", &self.name, NAME_MAX_LENGTH);
        check_text(&mut errors, "slug", &self.slug, NAME_MAX_LENGTH);
        match &self.color {
            Some(color) if !is_hex_color(color) => {
                errors.add("color", "Enter a valid HEX color, e.g. #E26C2D.")
            }
            Some(_) => {}
            None => errors.add("color", REQUIRED),
        }
        if let Some(slug) = &self.slug {
            if !is_slug(slug) {
                errors.add(
                    "slug",
                    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                );
            }
        }
        errors.into_result()?;

        match (self.name, self.color, self.slug) {
            (Some(name), Some(color), Some(slug)) => Ok(NewTag {
                name: name.trim().to_string(),
                color: color.to_uppercase(),
                slug: slug.trim().to_string(),
            }),
            _ => Err(TypeError::new("Incomplete tag").into()),
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_slug(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

//! View tree fixtures
//!
//! A small portfolio site (navigation header, home, login and register pages)
//! written in the directive syntax, plus helpers for building ad-hoc trees.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::temp_dir_in_workspace;

/// Navigation header shared by every page
///
/// `$Heading` holds the *name* of the variable carrying the brand text.
pub const HEADER: &str = r#"<header class="sticky-top">
    <nav class="navbar navbar-expand-lg">
        <div class="container">
            <?php if (isset($Heading)): ?><a class="navbar-brand" href="/"><?= $$Heading ?></a><?php endif ?>
            <ul class="navbar-nav ms-auto">
                <?php foreach ($NavItems as $key => $NavItem): ?>
                <?php if ($NavItem->DropDown): ?>
                <li class="nav-item dropdown">
                    <a class="nav-link dropdown-toggle" href="<?= $NavItem->Href ?>"><?= $NavItem->Name ?></a>
                    <ul class="dropdown-menu">
                        <?php foreach ($NavItem->DropDown as $DropDownItem): ?>
                        <li><a class="dropdown-item" href="<?= $DropDownItem->Href ?>"><?= $DropDownItem->Name ?></a></li>
                        <?php endforeach ?>
                    </ul>
                </li>
                <?php elseif ($NavItem->Disabled): ?>
                <li class="nav-item"><a class="nav-link disabled" aria-disabled="true"><?= $NavItem->Name ?></a></li>
                <?php else: ?>
                <li class="nav-item"><a class="nav-link" href="<?= $NavItem->Href ?>"><?= $NavItem->Name ?></a></li>
                <?php endif ?>
                <?php endforeach ?>
            </ul>
        </div>
    </nav>
</header>
"#;

pub const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title><?= $Title ?> | Portfolio</title>
</head>
<body>
    <?= include("components.header") /* navigation */ ?>
    <main>
        <section id="home">
            <h1><?= $Hero->Heading ?></h1>
            <p class="lead"><?= $Hero->SubHeading ?></p>
            <?php foreach ($Hero->CallToActions as $CallToAction): ?>
            <a href="<?= $CallToAction->Href ?>" class="btn btn-primary"><?= $CallToAction->Text ?></a>
            <?php endforeach ?>
        </section>
        <section id="skills">
            <?php foreach ($Skills as $skill): ?>
            <div class="progress-bar<?php if ($skill->Level >= 90): ?> bg-success<?php elseif ($skill->Level >= 80): ?> bg-primary<?php else: ?> bg-secondary<?php endif ?>" style="width: <?= $skill->Level ?>%;"><?= $skill->Name ?></div>
            <?php endforeach ?>
        </section>
    </main>
</body>
</html>
"#;

pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title><?= $FormTitle ?> | Portfolio</title>
</head>
<body>
    <?php include("components.header", ["Heading" => "FormTitle"]); ?>
    <main class="container">
        <form method="post" action="/login">
            <h1 class="h3 mb-3"><?= $FormTitle ?></h1>
            <?php if (isset($Error)): ?><div class="alert alert-danger"><?= $Error ?></div><?php endif ?>
            <input type="email" name="email" value="<?php if (isset($Email)): ?><?= $Email ?><?php endif ?>" placeholder="name@example.com">
            <input type="password" name="password">
            <button type="submit">Sign in</button>
        </form>
    </main>
</body>
</html>
"#;

pub const REGISTER_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title><?= $FormTitle ?> | Portfolio</title>
</head>
<body>
    <?= include("components.header", ["Heading" => "FormTitle"]) ?>
    <main class="container">
        <form method="post" action="/register">
            <?php foreach ($Fields as $Field): ?>
            <label for="<?= $Field->Id ?>"><?= $Field->Label ?></label>
            <input id="<?= $Field->Id ?>" type="<?= $Field->Type ?>" name="<?= $Field->Id ?>"<?php if ($Field->Required): ?> required<?php endif ?>>
            <?php endforeach ?>
            <button type="submit">Create account</button>
        </form>
    </main>
</body>
</html>
"#;

/// Data for rendering `home` against the portfolio tree
pub const PORTFOLIO_DATA_JSON: &str = r##"{
    "Title": "Home",
    "Heading": "SiteName",
    "SiteName": "Portfolio",
    "NavItems": [
        {"Name": "Home", "Href": "/", "DropDown": null, "Disabled": false},
        {"Name": "Projects", "Href": "#projects", "Disabled": false, "DropDown": [
            {"Name": "Rust", "Href": "/projects/rust"},
            {"Name": "Web", "Href": "/projects/web"}
        ]},
        {"Name": "Drafts", "Href": "/drafts", "DropDown": null, "Disabled": true}
    ],
    "Hero": {
        "Heading": "Hi, I build things",
        "SubHeading": "Systems & <web> work",
        "CallToActions": [
            {"Text": "Projects", "Href": "#projects"},
            {"Text": "Contact", "Href": "#contact"}
        ]
    },
    "Skills": [
        {"Name": "Rust", "Level": 95},
        {"Name": "Go", "Level": 85},
        {"Name": "CSS", "Level": 60}
    ],
    "FormTitle": "Sign in",
    "Fields": [
        {"Id": "email", "Label": "Email", "Type": "email", "Required": true},
        {"Id": "nickname", "Label": "Nickname", "Type": "text", "Required": false}
    ]
}"##;

/// A temporary project with a `views/` template root
pub struct ViewTree {
    dir: TempDir,
    root: PathBuf,
}

impl ViewTree {
    /// Empty tree under `.tmp/`
    pub fn new() -> Self {
        let dir = temp_dir_in_workspace();
        let root = dir.path().join("views");
        fs::create_dir_all(&root).expect("Failed to create views directory");
        Self { dir, root }
    }

    /// Tree populated with the portfolio views
    pub fn portfolio() -> Self {
        let tree = Self::new();
        tree.write("components/header.php", HEADER);
        tree.write("home/index.php", HOME_PAGE);
        tree.write("login/index.php", LOGIN_PAGE);
        tree.write("register/index.php", REGISTER_PAGE);
        tree
    }

    /// Project directory containing `views/` and any config file
    pub fn project_root(&self) -> &Path {
        self.dir.path()
    }

    /// Template root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a file relative to the template root, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write template");
        path
    }

    /// Remove a file relative to the template root
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.root.join(relative)).expect("Failed to remove template");
    }

    /// Write `pageweave.toml` at the project root
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("pageweave.toml");
        fs::write(&path, content).expect("Failed to write config");
        path
    }
}

impl Default for ViewTree {
    fn default() -> Self {
        Self::new()
    }
}

/*!

This is the long-form manual for `likert_survey` and the `intake` command.

## Scale

Every item is answered on a 5-point agreement scale, or marked as not applicable:

| answer | meaning |
|--------|---------|
| `1` | strongly disagree |
| `2` | disagree |
| `3` | neither agree nor disagree |
| `4` | agree |
| `5` | strongly agree |
| `N/A` | does not apply |

Items marked **(R)** are reverse-scored: the score is `6 - answer`.

## Scores

* the overall mean is taken over all the answers on the scale. It is `0` when
  nothing was answered on the scale.
* each block (dimension) gets the mean of its scored items, rounded to 2
  decimals. Blocks are listed from the lowest mean to the highest, so that the
  weakest dimensions come first. Blocks where every item is `N/A` or
  unanswered are left out.

## Signed links

A link for an organization carries three query parameters:

* `org` the organization name (URL-encoded)
* `exp` the expiry, in unix seconds
* `sig` the lowercase hex HMAC-SHA256 of `org|exp` using the shared secret

```bash
intake --config intake.json sign --organization "Acme Corp" --valid-for-hours 72 \
  --base-url https://forms.example.org/intake
```

A request without any of these parameters is accepted under the default
organization of the configuration. A request with only some of them, a wrong
signature or an expired link is refused.

Note that the `|` separator is not escaped: two different organization/expiry
pairs can only share a message if the organization name itself contains `|`.

## Configuration

The `--config` flag points to a JSON file:

```json
{
  "formTitle": "Inventory - Essential Factors",
  "defaultOrganization": "Open Institute",
  "linkSecretEnv": "INTAKE_LINK_SECRET",
  "catalogPath": "items.json",
  "submissionGate": true,
  "sessionTtlSecs": 3600,
  "store": {
    "provider": "sheets",
    "spreadsheetId": "1AbC...",
    "worksheet": "Factors",
    "accessTokenEnv": "INTAKE_SHEETS_TOKEN"
  }
}
```

`catalogPath` is optional, the built-in inventory is used otherwise. A catalog
file is a list of `{"block", "id", "text", "reversed"}` objects.

The `csv` store provider appends to a local file instead:

```json
"store": { "provider": "csv", "filePath": "responses.csv" }
```

## Exported rows

One row per item of the catalog:

`Timestamp, Respondent, Date, Organization, Block, Item, Answer, Score`

Unanswered and not applicable items carry `N/A` in the answer and score columns.

*/
